use serde::{Deserialize, Serialize};

use crate::model::common::election::{ElectionId, ElectionState};

/// Snapshot of an election's lifecycle, safe to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub election_id: ElectionId,
    pub state: ElectionState,
    pub ballots_received: u64,
    /// Set when the election closed but its result could not be produced.
    pub finalization_failed: bool,
}
