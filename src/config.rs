use std::collections::HashMap;
use std::sync::Arc;

use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::{
    model::{
        common::election::ElectionId,
        crypto::{MIN_PRIME_BITS, RECOMMENDED_PRIME_BITS},
        mongodb::{ensure_indexes_exist, Coll},
    },
    roster::{MongoRoster, Roster, StaticRoster},
    store::{MemoryStore, MongoStore, TallyStore},
    tally::Tally,
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_key_bits")]
    key_bits: u64,
}

fn default_key_bits() -> u64 {
    RECOMMENDED_PRIME_BITS
}

impl Config {
    /// Size in bits of each prime factor of a new election's modulus.
    pub fn key_bits(&self) -> u64 {
        self.key_bits
    }

    /// Reject configurations that would produce unusable keys.
    fn validate(&self) -> Result<(), String> {
        if self.key_bits < MIN_PRIME_BITS {
            return Err(format!(
                "key_bits = {} is below the minimum of {MIN_PRIME_BITS}",
                self.key_bits
            ));
        }
        if self.key_bits < RECOMMENDED_PRIME_BITS {
            warn!(
                "key_bits = {} is below the recommended {RECOMMENDED_PRIME_BITS}; \
only use this for testing",
                self.key_bits
            );
        }
        Ok(())
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if let Err(e) = config.validate() {
            error!("Invalid application config: {e}");
            return Err(rocket);
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for persistence and the voter roster.
#[derive(Deserialize)]
struct BackendConfig {
    // secrets
    db_uri: Option<String>,
    // non-secrets
    #[serde(default)]
    rosters: HashMap<String, u64>,
}

/// Turn the `rosters` table (keys are election IDs as strings) into roster
/// sizes.
fn parse_rosters(table: HashMap<String, u64>) -> Result<HashMap<ElectionId, u64>, String> {
    table
        .into_iter()
        .map(|(id, count)| {
            id.trim()
                .parse::<ElectionId>()
                .map(|id| (id, count))
                .map_err(|_| format!("invalid election ID {id:?} in `rosters`"))
        })
        .collect()
}

/// A fairing that sets up persistence and the roster, then builds the
/// [`Tally`] engine and places it into managed state.
///
/// With `db_uri` set, everything lives in MongoDB and the `Client` and
/// `Database` are managed too. Without it, state is kept in memory and roster
/// sizes come from the `rosters` table.
///
/// This fairing depends on [`Config`] being in managed state, and so must be
/// attached after [`ConfigFairing`].
pub struct TallyFairing;

#[rocket::async_trait]
impl Fairing for TallyFairing {
    fn info(&self) -> Info {
        Info {
            name: "Tally",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let key_bits = match rocket.state::<Config>() {
            Some(config) => config.key_bits(),
            None => {
                error!("Config was not available when building the tally engine");
                return Err(rocket);
            }
        };
        let config = match rocket.figment().extract::<BackendConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load backend config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let (store, roster): (Arc<dyn TallyStore>, Arc<dyn Roster>) = match config.db_uri {
            Some(db_uri) => {
                info!("Loaded database config, connecting...");
                let client = match MongoClient::with_uri_str(db_uri).await {
                    Ok(client) => client,
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                };
                let db = client.database(&get_database_name());

                // Ensure the required indexes exist.
                if let Err(e) = ensure_indexes_exist(&db).await {
                    error!("Failed to connect to database: {e}");
                    return Err(rocket);
                }
                if !config.rosters.is_empty() {
                    warn!("Ignoring `rosters` table; roster sizes are read from the database");
                }
                info!("...database connection online!");

                let store: Arc<dyn TallyStore> = Arc::new(MongoStore::from_db(&db));
                let roster: Arc<dyn Roster> = Arc::new(MongoRoster::new(Coll::from_db(&db)));
                rocket = rocket.manage(client).manage(db);
                (store, roster)
            }
            None => {
                let rosters = match parse_rosters(config.rosters) {
                    Ok(rosters) => rosters,
                    Err(e) => {
                        error!("Invalid backend config: {e}");
                        return Err(rocket);
                    }
                };
                warn!("No `db_uri` configured; election state will not survive a restart");
                info!("Loaded {} roster entries from config", rosters.len());
                let store: Arc<dyn TallyStore> = Arc::new(MemoryStore::new());
                let roster: Arc<dyn Roster> = Arc::new(StaticRoster::new(rosters));
                (store, roster)
            }
        };

        // Manage the state.
        rocket = rocket.manage(Tally::new(store, roster, key_bits));
        Ok(rocket)
    }
}

/// Get the name of the database to use.
fn get_database_name() -> String {
    "tally".to_string()
}

#[cfg(test)]
mod tests {
    use rocket::figment::{providers::Serialized, Figment};

    use super::*;

    #[test]
    fn key_bits_default_and_bounds() {
        let config: Config = Figment::new().extract().unwrap();
        assert_eq!(config.key_bits(), RECOMMENDED_PRIME_BITS);
        assert!(config.validate().is_ok());

        let small: Config = Figment::from(Serialized::default("key_bits", 32))
            .extract()
            .unwrap();
        assert!(small.validate().is_err());

        let testing: Config = Figment::from(Serialized::default("key_bits", 128))
            .extract()
            .unwrap();
        assert!(testing.validate().is_ok());
    }

    #[test]
    fn rosters_table_parses() {
        let table = HashMap::from([("1".to_string(), 3), (" 22 ".to_string(), 0)]);
        let rosters = parse_rosters(table).unwrap();
        assert_eq!(rosters.get(&1), Some(&3));
        assert_eq!(rosters.get(&22), Some(&0));

        let bad = HashMap::from([("first".to_string(), 3)]);
        assert!(parse_rosters(bad).is_err());
    }
}
