use std::sync::Arc;

use crate::{
    error::{Error, Result},
    model::{
        api::{ballot::EncryptedBallot, receipt::Receipt, status::StatusReport},
        common::election::{ElectionId, ElectionState, VoterId},
    },
    roster::Roster,
    store::TallyStore,
    tally::{
        locks::ElectionLocks, ElectionResult, KeyManager, ResultDecoder, TallyAccumulator,
    },
};

/// The election state machine: admits ballots, closes elections once every
/// eligible voter has voted, and publishes results.
///
/// This is the only component that mutates a [`TallyAccumulator`], and it
/// only ever does so while holding that election's lock.
pub struct Tally {
    keys: KeyManager,
    store: Arc<dyn TallyStore>,
    roster: Arc<dyn Roster>,
    locks: ElectionLocks,
}

impl Tally {
    pub fn new(store: Arc<dyn TallyStore>, roster: Arc<dyn Roster>, prime_bits: u64) -> Self {
        Self {
            keys: KeyManager::new(store.clone(), prime_bits),
            store,
            roster,
            locks: ElectionLocks::default(),
        }
    }

    pub fn keys(&self) -> &KeyManager {
        &self.keys
    }

    /// Admit a ballot from `voter`, closing the election if it was the last
    /// one expected.
    ///
    /// Either the ballot is folded in and counted exactly once, or an error
    /// is returned and nothing changed. Retrying after an unknown outcome is
    /// safe: a ballot that did land is reported as a duplicate.
    pub async fn submit(
        &self,
        election_id: ElectionId,
        voter: VoterId,
        ballot: EncryptedBallot,
    ) -> Result<Receipt> {
        // Reads and checks that don't change the tally happen before we
        // take the lock.
        let public = self.keys.public_key(election_id).await?;
        // A closed election refuses every ballot, however malformed. The
        // check under the lock below remains the one that counts.
        if self.load_tally(election_id).await?.is_closed() {
            return Err(Error::ElectionClosed(election_id));
        }
        if let Some(fingerprint) = &ballot.pk_fingerprint {
            if *fingerprint != public.fingerprint() {
                return Err(Error::KeyMismatch(election_id));
            }
        }
        public
            .validate(&ballot.ciphertext)
            .map_err(|e| Error::InvalidCiphertext(e.to_string()))?;
        let eligible_count = self.roster.eligible_count(election_id).await?;

        let _guard = self.locks.lock(election_id).await;

        let mut tally = self.load_tally(election_id).await?;
        let previous_count = tally.ballots_received;
        tally.admit(&public, voter, &ballot.ciphertext, eligible_count)?;
        let closing = tally.reached_quorum(eligible_count);
        if closing {
            tally.close();
        }

        // The fold and the state change land in a single write.
        self.store.replace_accumulator(&tally, previous_count).await?;
        debug!(
            "Admitted ballot {}/{eligible_count} for election {election_id}",
            tally.ballots_received
        );

        if closing {
            info!(
                "Election {election_id} closed after {} ballots",
                tally.ballots_received
            );
            self.finalize(&tally).await;
        }

        Ok(Receipt {
            election_id,
            ballots_received: tally.ballots_received,
            closed: closing,
        })
    }

    /// Current lifecycle state. Never causes a transition.
    pub async fn status(&self, election_id: ElectionId) -> Result<StatusReport> {
        let tally = self.load_tally(election_id).await?;
        Ok(StatusReport {
            election_id,
            state: tally.state,
            ballots_received: tally.ballots_received,
            finalization_failed: tally.finalization_failed,
        })
    }

    /// The published result, once the election has closed.
    pub async fn result(&self, election_id: ElectionId) -> Result<ElectionResult> {
        let tally = self.load_tally(election_id).await?;
        if tally.state == ElectionState::Open {
            return Err(Error::NotReady(election_id));
        }
        self.store
            .result(election_id)
            .await?
            .ok_or_else(|| Error::DecryptionError {
                election_id,
                reason: "election closed without a result, operator intervention required"
                    .to_string(),
            })
    }

    /// Load the tally for an election that has a key.
    async fn load_tally(&self, election_id: ElectionId) -> Result<TallyAccumulator> {
        match self.store.accumulator(election_id).await? {
            Some(tally) => Ok(tally),
            // The key is written before the tally, so a key without a tally
            // just means nothing has been recorded yet.
            None if self.store.key(election_id).await?.is_some() => {
                Ok(TallyAccumulator::new(election_id))
            }
            None => Err(Error::NotFound(format!(
                "No election with ID {election_id}"
            ))),
        }
    }

    /// Decrypt and publish the result of a just-closed election.
    ///
    /// Failure here is never retried: the election stays closed without a
    /// result and is flagged for an operator.
    async fn finalize(&self, tally: &TallyAccumulator) {
        let election_id = tally.election_id;
        let outcome = match ResultDecoder::new(&self.keys)
            .decrypt_and_finalize(tally)
            .await
        {
            Ok(result) => self.store.insert_result(&result).await.map(|_| result),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => info!(
                "Published result for election {election_id}: {} ballots",
                result.total
            ),
            Err(e) => {
                error!("Finalisation of election {election_id} failed: {e}");
                if let Err(e) = self.store.mark_finalization_failed(election_id).await {
                    error!("Could not flag election {election_id} as failed: {e}");
                }
            }
        }
    }
}
