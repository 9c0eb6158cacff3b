//! Paillier cryptosystem primitives used for homomorphic yes/no tallying.

pub mod decimal;
mod paillier;
mod prime;

pub use paillier::{generate_keypair, CryptoError, PrivateKey, PublicKey};
pub use prime::{generate_prime, is_probable_prime};

/// Smallest prime size accepted for production keys.
pub const RECOMMENDED_PRIME_BITS: u64 = 1024;

/// Absolute floor on prime size; anything smaller is refused outright.
pub const MIN_PRIME_BITS: u64 = 64;
