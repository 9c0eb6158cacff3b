use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        common::election::{ElectionId, ElectionState, VoterId},
        crypto::{decimal, PublicKey},
    },
};

/// Running encrypted tally for one election, as persisted.
///
/// Individual ciphertexts are never kept; only the product of all of them
/// and the set of voters who contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyAccumulator {
    pub election_id: ElectionId,
    /// Product of every admitted ciphertext mod n^2.
    #[serde(with = "decimal")]
    pub encrypted_sum: BigUint,
    pub ballots_received: u64,
    /// Voters whose ballot has been folded in.
    pub voters: BTreeSet<VoterId>,
    pub state: ElectionState,
    pub closed_at: Option<DateTime<Utc>>,
    /// The election closed but no result could be produced.
    #[serde(default)]
    pub finalization_failed: bool,
}

impl TallyAccumulator {
    /// A fresh accumulator holding the encryption of zero.
    pub fn new(election_id: ElectionId) -> Self {
        Self {
            election_id,
            encrypted_sum: PublicKey::zero(),
            ballots_received: 0,
            voters: BTreeSet::new(),
            state: ElectionState::Open,
            closed_at: None,
            finalization_failed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == ElectionState::Closed
    }

    pub fn has_voted(&self, voter: &VoterId) -> bool {
        self.voters.contains(voter)
    }

    /// Admit one ballot: check it may be counted, then fold it into the sum.
    ///
    /// The ciphertext must already have passed [`PublicKey::validate`].
    /// On error nothing is modified.
    pub fn admit(
        &mut self,
        key: &PublicKey,
        voter: VoterId,
        ciphertext: &BigUint,
        eligible_count: u64,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ElectionClosed(self.election_id));
        }
        if self.has_voted(&voter) {
            return Err(Error::DuplicateVote(self.election_id));
        }
        if self.ballots_received >= eligible_count {
            return Err(Error::RosterExceeded {
                election_id: self.election_id,
                ballots_received: self.ballots_received,
                eligible_count,
            });
        }

        self.encrypted_sum = key.add(&self.encrypted_sum, ciphertext);
        self.ballots_received += 1;
        self.voters.insert(voter);
        Ok(())
    }

    /// Has the ballot just admitted brought the count to exactly the roster
    /// size?
    ///
    /// Only meaningful straight after [`Self::admit`]; closure is triggered
    /// by reaching the roster size, never by a later comparison.
    pub fn reached_quorum(&self, eligible_count: u64) -> bool {
        self.ballots_received == eligible_count
    }

    /// Transition to `Closed`. Calling this twice is a logic error.
    pub fn close(&mut self) {
        debug_assert!(!self.is_closed(), "election closed twice");
        self.state = ElectionState::Closed;
        self.closed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use num_traits::One;

    use super::*;
    use crate::model::crypto::generate_keypair;

    fn voter(name: &str) -> VoterId {
        VoterId::new(name).unwrap()
    }

    #[test]
    fn fresh_accumulator_is_encryption_of_zero() {
        let tally = TallyAccumulator::new(4);
        assert!(tally.encrypted_sum.is_one());
        assert_eq!(tally.ballots_received, 0);
        assert_eq!(tally.state, ElectionState::Open);
    }

    #[test]
    fn fold_then_decrypt() {
        let mut rng = rand::thread_rng();
        let (public, private) = generate_keypair(128, &mut rng);
        for v in [0u32, 1] {
            let mut tally = TallyAccumulator::new(1);
            let c = public.encrypt(&BigUint::from(v), &mut rng);
            tally.admit(&public, voter("a"), &c, 10).unwrap();
            let plain = private.decrypt(&public, &tally.encrypted_sum).unwrap();
            assert_eq!(plain, BigUint::from(v));
        }
    }

    #[test]
    fn duplicate_voter_is_rejected_without_mutation() {
        let mut rng = rand::thread_rng();
        let (public, _) = generate_keypair(128, &mut rng);
        let mut tally = TallyAccumulator::new(1);
        let c = public.encrypt(&BigUint::one(), &mut rng);
        tally.admit(&public, voter("a"), &c, 3).unwrap();
        let before = tally.clone();

        let c2 = public.encrypt(&BigUint::one(), &mut rng);
        assert!(matches!(
            tally.admit(&public, voter("a"), &c2, 3),
            Err(Error::DuplicateVote(1))
        ));
        assert_eq!(tally, before);
    }

    #[test]
    fn closed_accumulator_rejects_ballots() {
        let mut rng = rand::thread_rng();
        let (public, _) = generate_keypair(128, &mut rng);
        let mut tally = TallyAccumulator::new(1);
        tally.close();
        let before = tally.clone();
        let c = public.encrypt(&BigUint::one(), &mut rng);
        assert!(matches!(
            tally.admit(&public, voter("a"), &c, 3),
            Err(Error::ElectionClosed(1))
        ));
        assert_eq!(tally, before);
    }

    #[test]
    fn ballots_beyond_roster_are_rejected() {
        let mut rng = rand::thread_rng();
        let (public, _) = generate_keypair(128, &mut rng);
        let mut tally = TallyAccumulator::new(1);
        let c = public.encrypt(&BigUint::one(), &mut rng);
        tally.admit(&public, voter("a"), &c, 2).unwrap();
        // The roster shrank to one after the first ballot.
        assert!(matches!(
            tally.admit(&public, voter("b"), &c, 1),
            Err(Error::RosterExceeded {
                ballots_received: 1,
                eligible_count: 1,
                ..
            })
        ));
        assert_eq!(tally.ballots_received, 1);
    }

    #[test]
    fn quorum_is_exact_equality() {
        let mut tally = TallyAccumulator::new(1);
        tally.ballots_received = 3;
        assert!(tally.reached_quorum(3));
        assert!(!tally.reached_quorum(4));
        assert!(!tally.reached_quorum(2));
    }
}
