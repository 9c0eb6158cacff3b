use mongodb::{bson::doc, options::ReplaceOptions, Database};

use crate::{
    error::{Error, Result},
    model::{
        common::election::{ElectionId, ElectionState},
        mongodb::{election_filter, is_duplicate_key_error, Coll},
    },
    store::TallyStore,
    tally::{ElectionKey, ElectionResult, TallyAccumulator},
};

/// MongoDB-backed store.
///
/// Relies on the unique `election_id` indexes created by
/// [`crate::model::mongodb::ensure_indexes_exist`]. Each tally, including its
/// admitted voter set, is a single document, so a fold is one atomic write.
pub struct MongoStore {
    keys: Coll<ElectionKey>,
    tallies: Coll<TallyAccumulator>,
    results: Coll<ElectionResult>,
}

impl MongoStore {
    pub fn from_db(db: &Database) -> Self {
        Self {
            keys: Coll::from_db(db),
            tallies: Coll::from_db(db),
            results: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl TallyStore for MongoStore {
    async fn insert_election(&self, key: &ElectionKey, tally: &TallyAccumulator) -> Result<()> {
        match self.keys.insert_one(key, None).await {
            Ok(_) => {}
            Err(e) if is_duplicate_key_error(&e) => {
                return Err(Error::AlreadyExists(key.election_id))
            }
            Err(e) => return Err(e.into()),
        }
        // If we crash before this insert, readers treat the missing tally
        // as empty and the first fold upserts it.
        match self.tallies.insert_one(tally, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key_error(&e) => {
                warn!("Tally for election {} already existed", key.election_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn key(&self, election_id: ElectionId) -> Result<Option<ElectionKey>> {
        Ok(self.keys.find_one(election_filter(election_id), None).await?)
    }

    async fn accumulator(&self, election_id: ElectionId) -> Result<Option<TallyAccumulator>> {
        Ok(self
            .tallies
            .find_one(election_filter(election_id), None)
            .await?)
    }

    async fn replace_accumulator(
        &self,
        tally: &TallyAccumulator,
        expected_count: u64,
    ) -> Result<()> {
        let election_id = tally.election_id;
        let filter = doc! {
            "election_id": election_id,
            "ballots_received": expected_count as i64,
            "state": ElectionState::Open,
        };
        // Only the very first fold may need to create the document.
        let options = ReplaceOptions::builder()
            .upsert(expected_count == 0)
            .build();
        match self.tallies.replace_one(filter, tally, options).await {
            Ok(result) if result.matched_count == 1 || result.upserted_id.is_some() => Ok(()),
            Ok(_) => Err(Error::Contention(election_id)),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::Contention(election_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn mark_finalization_failed(&self, election_id: ElectionId) -> Result<()> {
        let update = doc! { "$set": { "finalization_failed": true } };
        let result = self
            .tallies
            .update_one(election_filter(election_id), update, None)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::NotFound(format!(
                "No tally for election {election_id}"
            )));
        }
        Ok(())
    }

    async fn insert_result(&self, result: &ElectionResult) -> Result<()> {
        match self.results.insert_one(result, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::AlreadyExists(result.election_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn result(&self, election_id: ElectionId) -> Result<Option<ElectionResult>> {
        Ok(self
            .results
            .find_one(election_filter(election_id), None)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mongodb::Database;
    use num_bigint::BigUint;

    use super::*;
    use crate::{
        model::{api::ballot::EncryptedBallot, common::election::VoterId, crypto::generate_keypair},
        roster::{MongoRoster, Roster, RosterEntry},
        tally::Tally,
    };

    fn key(election_id: ElectionId) -> ElectionKey {
        let (public, private) = generate_keypair(64, &mut rand::thread_rng());
        ElectionKey::new(election_id, public, private)
    }

    fn folded(election_id: ElectionId, voters: &[&str]) -> TallyAccumulator {
        let mut tally = TallyAccumulator::new(election_id);
        for voter in voters {
            tally.voters.insert(VoterId::new(*voter).unwrap());
        }
        tally.ballots_received = voters.len() as u64;
        tally
    }

    #[backend_test]
    async fn insert_election_is_write_once(db: Database) {
        let store = MongoStore::from_db(&db);
        let first = key(1);
        store
            .insert_election(&first, &TallyAccumulator::new(1))
            .await
            .unwrap();
        assert!(matches!(
            store.insert_election(&key(1), &TallyAccumulator::new(1)).await,
            Err(Error::AlreadyExists(1))
        ));
        assert_eq!(store.key(1).await.unwrap().unwrap().public, first.public);
        assert_eq!(
            store.accumulator(1).await.unwrap(),
            Some(TallyAccumulator::new(1))
        );
    }

    #[backend_test]
    async fn insert_election_tolerates_existing_tally(db: Database) {
        // Left behind by a crash between the two inserts of an earlier attempt.
        Coll::<TallyAccumulator>::from_db(&db)
            .insert_one(TallyAccumulator::new(2), None)
            .await
            .unwrap();
        let store = MongoStore::from_db(&db);
        store
            .insert_election(&key(2), &TallyAccumulator::new(2))
            .await
            .unwrap();
        assert!(store.key(2).await.unwrap().is_some());
    }

    #[backend_test]
    async fn first_fold_creates_missing_tally(db: Database) {
        let store = MongoStore::from_db(&db);
        let tally = folded(3, &["a"]);
        store.replace_accumulator(&tally, 0).await.unwrap();
        assert_eq!(store.accumulator(3).await.unwrap(), Some(tally));
    }

    #[backend_test]
    async fn stale_replace_loses(db: Database) {
        let store = MongoStore::from_db(&db);
        store
            .insert_election(&key(1), &TallyAccumulator::new(1))
            .await
            .unwrap();
        let winner = folded(1, &["a"]);
        store.replace_accumulator(&winner, 0).await.unwrap();

        // Another writer that also read zero ballots.
        let stale = folded(1, &["b"]);
        assert!(matches!(
            store.replace_accumulator(&stale, 0).await,
            Err(Error::Contention(1))
        ));
        // And one that thinks more ballots are in than there are.
        let ahead = folded(1, &["a", "b", "c"]);
        assert!(matches!(
            store.replace_accumulator(&ahead, 2).await,
            Err(Error::Contention(1))
        ));
        assert_eq!(store.accumulator(1).await.unwrap(), Some(winner));

        let next = folded(1, &["a", "b"]);
        store.replace_accumulator(&next, 1).await.unwrap();
        assert_eq!(store.accumulator(1).await.unwrap(), Some(next));
    }

    #[backend_test]
    async fn closed_tally_cannot_be_replaced(db: Database) {
        let store = MongoStore::from_db(&db);
        let mut closed = folded(1, &["a"]);
        closed.close();
        store.insert_election(&key(1), &closed).await.unwrap();

        assert!(matches!(
            store.replace_accumulator(&folded(1, &["a", "b"]), 1).await,
            Err(Error::Contention(1))
        ));
        // An upserting first fold must not sneak past the filter either.
        assert!(matches!(
            store.replace_accumulator(&folded(1, &["b"]), 0).await,
            Err(Error::Contention(1))
        ));
        assert_eq!(store.accumulator(1).await.unwrap(), Some(closed));
    }

    #[backend_test]
    async fn finalization_failure_is_flagged(db: Database) {
        let store = MongoStore::from_db(&db);
        store
            .insert_election(&key(1), &TallyAccumulator::new(1))
            .await
            .unwrap();
        store.mark_finalization_failed(1).await.unwrap();
        assert!(store.accumulator(1).await.unwrap().unwrap().finalization_failed);

        assert!(matches!(
            store.mark_finalization_failed(9).await,
            Err(Error::NotFound(_))
        ));
    }

    #[backend_test]
    async fn results_are_write_once(db: Database) {
        let store = MongoStore::from_db(&db);
        let result = ElectionResult {
            election_id: 1,
            yes_count: 1,
            no_count: 0,
            total: 1,
        };
        store.insert_result(&result).await.unwrap();
        let other = ElectionResult {
            yes_count: 0,
            no_count: 1,
            ..result
        };
        assert!(matches!(
            store.insert_result(&other).await,
            Err(Error::AlreadyExists(1))
        ));
        assert_eq!(store.result(1).await.unwrap(), Some(result));
        assert_eq!(store.result(2).await.unwrap(), None);
    }

    #[backend_test]
    async fn full_election_against_the_database(db: Database) {
        Coll::<RosterEntry>::from_db(&db)
            .insert_one(
                RosterEntry {
                    election_id: 1,
                    eligible_count: 3,
                },
                None,
            )
            .await
            .unwrap();
        let store = Arc::new(MongoStore::from_db(&db));
        let roster = Arc::new(MongoRoster::new(Coll::from_db(&db)));
        assert_eq!(roster.eligible_count(1).await.unwrap(), 3);
        assert!(matches!(roster.eligible_count(2).await, Err(Error::NotFound(_))));

        let tally = Tally::new(store.clone(), roster, 128);
        let public = tally.keys().create_key(1).await.unwrap();
        for (voter, yes) in [("v1", true), ("v2", false), ("v3", true)] {
            let m = BigUint::from(u32::from(yes));
            let ballot = EncryptedBallot::new(public.encrypt(&m, &mut rand::thread_rng()));
            tally
                .submit(1, VoterId::new(voter).unwrap(), ballot)
                .await
                .unwrap();
        }

        let result = tally.result(1).await.unwrap();
        assert_eq!((result.yes_count, result.no_count, result.total), (2, 1, 3));
        assert_eq!(store.result(1).await.unwrap(), Some(result));
        let stored = store.accumulator(1).await.unwrap().unwrap();
        assert_eq!(stored.state, ElectionState::Closed);
        assert_eq!(stored.voters.len(), 3);
    }
}
