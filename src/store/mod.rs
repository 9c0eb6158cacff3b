//! Persistence for keys, running tallies and results.
//!
//! The engine only needs the handful of operations on [`TallyStore`]; the
//! storage technology behind them is chosen at launch.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use crate::{
    error::Result,
    model::common::election::ElectionId,
    tally::{ElectionKey, ElectionResult, TallyAccumulator},
};

#[rocket::async_trait]
pub trait TallyStore: Send + Sync {
    /// Record a new election's key and its empty tally.
    ///
    /// Fails with [`crate::error::Error::AlreadyExists`] if the election
    /// already has a key; the existing key is left untouched.
    async fn insert_election(&self, key: &ElectionKey, tally: &TallyAccumulator) -> Result<()>;

    async fn key(&self, election_id: ElectionId) -> Result<Option<ElectionKey>>;

    async fn accumulator(&self, election_id: ElectionId) -> Result<Option<TallyAccumulator>>;

    /// Replace an open election's tally, provided nobody else has folded a
    /// ballot since it was read with `expected_count` ballots.
    ///
    /// Fails with [`crate::error::Error::Contention`] otherwise, without
    /// writing anything.
    async fn replace_accumulator(&self, tally: &TallyAccumulator, expected_count: u64)
        -> Result<()>;

    /// Flag a closed election whose result could not be produced.
    async fn mark_finalization_failed(&self, election_id: ElectionId) -> Result<()>;

    /// Store a result. Results are write-once.
    async fn insert_result(&self, result: &ElectionResult) -> Result<()>;

    async fn result(&self, election_id: ElectionId) -> Result<Option<ElectionResult>>;
}
