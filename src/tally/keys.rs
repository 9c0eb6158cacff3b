use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use rocket::tokio::task;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        common::election::ElectionId,
        crypto::{generate_keypair, PrivateKey, PublicKey},
    },
    store::TallyStore,
    tally::TallyAccumulator,
};

/// The keypair for one election, as persisted.
///
/// The private half is only reachable through [`KeyManager::decrypt`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionKey {
    pub election_id: ElectionId,
    pub public: PublicKey,
    private: PrivateKey,
    pub created_at: DateTime<Utc>,
}

impl ElectionKey {
    pub fn new(election_id: ElectionId, public: PublicKey, private: PrivateKey) -> Self {
        Self {
            election_id,
            public,
            private,
            created_at: Utc::now(),
        }
    }
}

/// Issues and guards one keypair per election.
pub struct KeyManager {
    store: Arc<dyn TallyStore>,
    prime_bits: u64,
    public_keys: RwLock<HashMap<ElectionId, PublicKey>>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn TallyStore>, prime_bits: u64) -> Self {
        Self {
            store,
            prime_bits,
            public_keys: Default::default(),
        }
    }

    /// Generate and store the keypair for a new election, returning the
    /// public half.
    ///
    /// Creation is never idempotent: a second call for the same election
    /// fails with [`Error::AlreadyExists`] and leaves the original key in
    /// place, so ballots already cast stay decryptable.
    pub async fn create_key(&self, election_id: ElectionId) -> Result<PublicKey> {
        if self.store.key(election_id).await?.is_some() {
            return Err(Error::AlreadyExists(election_id));
        }

        // Prime generation is CPU-heavy; keep it off the async workers.
        let prime_bits = self.prime_bits;
        debug!("Generating {prime_bits}-bit primes for election {election_id}");
        let (public, private) =
            task::spawn_blocking(move || generate_keypair(prime_bits, &mut rand::thread_rng()))
                .await
                .map_err(|e| Error::Internal(format!("key generation task failed: {e}")))?;

        // The store enforces uniqueness, so a racing creator loses here.
        let key = ElectionKey::new(election_id, public.clone(), private);
        self.store
            .insert_election(&key, &TallyAccumulator::new(election_id))
            .await?;
        info!(
            "Created key for election {election_id} (fingerprint {})",
            public.fingerprint()
        );

        self.cache(election_id, &public);
        Ok(public)
    }

    /// The public key for an election.
    pub async fn public_key(&self, election_id: ElectionId) -> Result<PublicKey> {
        if let Some(key) = self.cached(election_id) {
            return Ok(key);
        }
        let key = self
            .store
            .key(election_id)
            .await?
            .ok_or_else(|| no_key(election_id))?;
        self.cache(election_id, &key.public);
        Ok(key.public)
    }

    /// Decrypt a ciphertext under an election's private key.
    pub(crate) async fn decrypt(
        &self,
        election_id: ElectionId,
        ciphertext: &BigUint,
    ) -> Result<BigUint> {
        let key = self
            .store
            .key(election_id)
            .await?
            .ok_or_else(|| no_key(election_id))?;
        key.private
            .decrypt(&key.public, ciphertext)
            .map_err(|e| Error::InvalidCiphertext(e.to_string()))
    }

    fn cached(&self, election_id: ElectionId) -> Option<PublicKey> {
        let keys = self.public_keys.read().unwrap_or_else(|e| e.into_inner());
        keys.get(&election_id).cloned()
    }

    fn cache(&self, election_id: ElectionId, key: &PublicKey) {
        let mut keys = self.public_keys.write().unwrap_or_else(|e| e.into_inner());
        keys.insert(election_id, key.clone());
    }
}

fn no_key(election_id: ElectionId) -> Error {
    Error::NotFound(format!("No key exists for election {election_id}"))
}
