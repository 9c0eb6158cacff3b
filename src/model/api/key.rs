use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::model::crypto::{decimal, PublicKey};

/// Public key material for an election, as handed to voters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescription {
    /// Modulus, decimal.
    #[serde(with = "decimal")]
    pub n: BigUint,
    /// Generator, decimal.
    #[serde(with = "decimal")]
    pub g: BigUint,
    /// Echo this back with a ballot to prove it was encrypted under this key.
    pub pk_fingerprint: String,
}

impl From<&PublicKey> for KeyDescription {
    fn from(key: &PublicKey) -> Self {
        Self {
            n: key.n().clone(),
            g: key.g().clone(),
            pk_fingerprint: key.fingerprint(),
        }
    }
}

impl From<KeyDescription> for PublicKey {
    fn from(desc: KeyDescription) -> Self {
        PublicKey::from_parts(desc.n, desc.g)
    }
}
