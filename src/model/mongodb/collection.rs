use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::{
    model::common::election::ElectionId,
    roster::RosterEntry,
    tally::{ElectionKey, ElectionResult, TallyAccumulator},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for ElectionKey {
    const NAME: &'static str = "election_keys";
}

impl MongoCollection for TallyAccumulator {
    const NAME: &'static str = "tallies";
}

impl MongoCollection for ElectionResult {
    const NAME: &'static str = "results";
}

impl MongoCollection for RosterEntry {
    const NAME: &'static str = "rosters";
}

/// Filter selecting the document for a single election.
pub fn election_filter(election_id: ElectionId) -> mongodb::bson::Document {
    doc! { "election_id": election_id }
}

/// Ensure that all the required indexes exist on the given database.
///
/// Every per-election collection gets a unique index on `election_id`; this
/// is what turns a second key creation into a duplicate key error.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();
    let by_election = || {
        IndexModel::builder()
            .keys(doc! {"election_id": 1})
            .options(unique.clone())
            .build()
    };

    Coll::<ElectionKey>::from_db(db)
        .create_index(by_election(), None)
        .await?;
    Coll::<TallyAccumulator>::from_db(db)
        .create_index(by_election(), None)
        .await?;
    Coll::<ElectionResult>::from_db(db)
        .create_index(by_election(), None)
        .await?;
    Coll::<RosterEntry>::from_db(db)
        .create_index(by_election(), None)
        .await?;

    Ok(())
}
