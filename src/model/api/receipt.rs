use serde::{Deserialize, Serialize};

use crate::model::common::election::ElectionId;

/// Acknowledgement of an admitted ballot.
///
/// Deliberately carries nothing derived from the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub election_id: ElectionId,
    /// Ballots admitted so far, including this one.
    pub ballots_received: u64,
    /// Whether this ballot closed the election.
    pub closed: bool,
}
