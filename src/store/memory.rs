use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::{
    error::{Error, Result},
    model::common::election::ElectionId,
    store::TallyStore,
    tally::{ElectionKey, ElectionResult, TallyAccumulator},
};

#[derive(Default)]
struct Tables {
    keys: HashMap<ElectionId, ElectionKey>,
    tallies: HashMap<ElectionId, TallyAccumulator>,
    results: HashMap<ElectionId, ElectionResult>,
}

/// A process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // Every write below is a single insert, so a poisoned lock still
        // holds consistent data.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[rocket::async_trait]
impl TallyStore for MemoryStore {
    async fn insert_election(&self, key: &ElectionKey, tally: &TallyAccumulator) -> Result<()> {
        let mut tables = self.tables();
        if tables.keys.contains_key(&key.election_id) {
            return Err(Error::AlreadyExists(key.election_id));
        }
        tables.keys.insert(key.election_id, key.clone());
        tables.tallies.insert(tally.election_id, tally.clone());
        Ok(())
    }

    async fn key(&self, election_id: ElectionId) -> Result<Option<ElectionKey>> {
        Ok(self.tables().keys.get(&election_id).cloned())
    }

    async fn accumulator(&self, election_id: ElectionId) -> Result<Option<TallyAccumulator>> {
        Ok(self.tables().tallies.get(&election_id).cloned())
    }

    async fn replace_accumulator(
        &self,
        tally: &TallyAccumulator,
        expected_count: u64,
    ) -> Result<()> {
        let mut tables = self.tables();
        let unchanged = match tables.tallies.get(&tally.election_id) {
            Some(current) => !current.is_closed() && current.ballots_received == expected_count,
            None => expected_count == 0,
        };
        if !unchanged {
            return Err(Error::Contention(tally.election_id));
        }
        tables.tallies.insert(tally.election_id, tally.clone());
        Ok(())
    }

    async fn mark_finalization_failed(&self, election_id: ElectionId) -> Result<()> {
        let mut tables = self.tables();
        let tally = tables
            .tallies
            .get_mut(&election_id)
            .ok_or_else(|| Error::NotFound(format!("No tally for election {election_id}")))?;
        tally.finalization_failed = true;
        Ok(())
    }

    async fn insert_result(&self, result: &ElectionResult) -> Result<()> {
        let mut tables = self.tables();
        if tables.results.contains_key(&result.election_id) {
            return Err(Error::AlreadyExists(result.election_id));
        }
        tables.results.insert(result.election_id, *result);
        Ok(())
    }

    async fn result(&self, election_id: ElectionId) -> Result<Option<ElectionResult>> {
        Ok(self.tables().results.get(&election_id).copied())
    }
}
