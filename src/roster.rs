//! The voter roster, owned by an external system. We only ever read the
//! number of voters eligible for an election.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        common::election::ElectionId,
        mongodb::{election_filter, Coll},
    },
};

#[rocket::async_trait]
pub trait Roster: Send + Sync {
    /// Number of voters entitled to vote in an election.
    async fn eligible_count(&self, election_id: ElectionId) -> Result<u64>;
}

fn no_roster(election_id: ElectionId) -> Error {
    Error::NotFound(format!("No roster for election {election_id}"))
}

/// Roster sizes held in memory, seeded from configuration.
#[derive(Default)]
pub struct StaticRoster {
    counts: RwLock<HashMap<ElectionId, u64>>,
}

impl StaticRoster {
    pub fn new(counts: HashMap<ElectionId, u64>) -> Self {
        Self {
            counts: RwLock::new(counts),
        }
    }

    /// Update an election's roster size, e.g. when embedding the engine.
    pub fn set_eligible_count(&self, election_id: ElectionId, count: u64) {
        let mut counts = self.counts.write().unwrap_or_else(|e| e.into_inner());
        counts.insert(election_id, count);
    }

    /// Forget an election's roster entirely.
    pub fn remove(&self, election_id: ElectionId) {
        let mut counts = self.counts.write().unwrap_or_else(|e| e.into_inner());
        counts.remove(&election_id);
    }
}

#[rocket::async_trait]
impl Roster for StaticRoster {
    async fn eligible_count(&self, election_id: ElectionId) -> Result<u64> {
        let counts = self.counts.read().unwrap_or_else(|e| e.into_inner());
        counts
            .get(&election_id)
            .copied()
            .ok_or_else(|| no_roster(election_id))
    }
}

/// A roster document maintained by the voter-management system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub election_id: ElectionId,
    pub eligible_count: u64,
}

/// Reads roster sizes from the `rosters` collection.
pub struct MongoRoster {
    rosters: Coll<RosterEntry>,
}

impl MongoRoster {
    pub fn new(rosters: Coll<RosterEntry>) -> Self {
        Self { rosters }
    }
}

#[rocket::async_trait]
impl Roster for MongoRoster {
    async fn eligible_count(&self, election_id: ElectionId) -> Result<u64> {
        self.rosters
            .find_one(election_filter(election_id), None)
            .await?
            .map(|entry| entry.eligible_count)
            .ok_or_else(|| no_roster(election_id))
    }
}
