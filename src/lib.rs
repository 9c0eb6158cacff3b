#[macro_use]
extern crate rocket;
#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod roster;
pub mod store;
pub mod tally;

use config::{ConfigFairing, TallyFairing};
use logging::LoggerFairing;
use tally::Tally;

/// Build the server. Configuration, persistence and the tally engine are set
/// up by fairings at ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(TallyFairing)
}

/// Build the server around an existing tally engine, skipping the
/// persistence fairings.
pub fn rocket_for_tally(tally: Tally) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .manage(tally)
}

/// Prime size used by tests, to keep key generation quick.
#[cfg(test)]
pub(crate) const TEST_PRIME_BITS: u64 = 128;

/// A local client backed by an in-memory store, plus the roster it reads, so
/// that tests can declare eligible voters.
#[cfg(test)]
pub(crate) async fn test_client() -> (
    rocket::local::asynchronous::Client,
    std::sync::Arc<roster::StaticRoster>,
) {
    use std::sync::Arc;

    let store = Arc::new(store::MemoryStore::new());
    let roster = Arc::new(roster::StaticRoster::default());
    let tally = Tally::new(store, roster.clone(), TEST_PRIME_BITS);
    let client = rocket::local::asynchronous::Client::tracked(rocket_for_tally(tally))
        .await
        .unwrap();
    (client, roster)
}

/// A freshly named database with every index in place, if `db_uri` is
/// configured. Tests that need one are skipped otherwise.
#[cfg(test)]
pub(crate) async fn test_db() -> Option<mongodb::Database> {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .ok()?;
    let client = mongodb::Client::with_uri_str(&db_uri).await.unwrap();
    let db = client.database(&format!("tally_test_{:08x}", rand::random::<u32>()));
    model::mongodb::ensure_indexes_exist(&db).await.unwrap();
    Some(db)
}
