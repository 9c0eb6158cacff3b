use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::common::election::ElectionId,
    tally::{KeyManager, TallyAccumulator},
};

/// The published outcome of a closed election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResult {
    pub election_id: ElectionId,
    pub yes_count: u64,
    pub no_count: u64,
    pub total: u64,
}

/// Turns the encrypted sum of a closed election into its result.
pub struct ResultDecoder<'a> {
    keys: &'a KeyManager,
}

impl<'a> ResultDecoder<'a> {
    pub fn new(keys: &'a KeyManager) -> Self {
        Self { keys }
    }

    /// Decrypt the accumulated sum and derive the counts.
    ///
    /// Each ballot encrypts 0 or 1 and the number of ballots is tiny next to
    /// n, so the decrypted sum is exactly the number of yes votes. Anything
    /// outside `[0, ballots_received]` means the sum or the key is corrupt,
    /// and no result is produced.
    pub async fn decrypt_and_finalize(&self, tally: &TallyAccumulator) -> Result<ElectionResult> {
        let election_id = tally.election_id;
        if !tally.is_closed() {
            return Err(Error::NotReady(election_id));
        }

        let sum = self
            .keys
            .decrypt(election_id, &tally.encrypted_sum)
            .await
            .map_err(|e| match e {
                Error::InvalidCiphertext(reason) => Error::DecryptionError {
                    election_id,
                    reason,
                },
                other => other,
            })?;

        let total = tally.ballots_received;
        let yes_count = sum
            .to_u64()
            .filter(|yes| *yes <= total)
            .ok_or_else(|| Error::DecryptionError {
                election_id,
                reason: format!("decrypted sum is outside [0, {total}]"),
            })?;

        Ok(ElectionResult {
            election_id,
            yes_count,
            no_count: total - yes_count,
            total,
        })
    }
}
