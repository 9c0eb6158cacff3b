use data_encoding::HEXLOWER;
use num_bigint::{BigInt, BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::{decimal, prime::generate_prime, MIN_PRIME_BITS};

/// Reasons a ciphertext or key operation can be refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("ciphertext is outside [1, n^2)")]
    OutOfRange,
    #[error("ciphertext shares a factor with n")]
    NotInvertible,
    #[error("generator does not yield an invertible L(g^lambda)")]
    BadGenerator,
}

/// Paillier public key `(n, g)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    #[serde(with = "decimal")]
    n: BigUint,
    #[serde(with = "decimal")]
    g: BigUint,
}

impl PublicKey {
    /// Public key for modulus `n` with the standard generator `g = n + 1`.
    pub fn new(n: BigUint) -> Self {
        let g = &n + 1u32;
        Self { n, g }
    }

    /// Public key with an explicit generator, as received over the wire.
    pub fn from_parts(n: BigUint, g: BigUint) -> Self {
        Self { n, g }
    }

    pub fn n(&self) -> &BigUint {
        &self.n
    }

    pub fn g(&self) -> &BigUint {
        &self.g
    }

    pub fn n_squared(&self) -> BigUint {
        &self.n * &self.n
    }

    /// The encryption of zero with no randomness, i.e. the identity of
    /// homomorphic addition.
    pub fn zero() -> BigUint {
        BigUint::one()
    }

    /// Check that `c` could be a ciphertext under this key.
    ///
    /// Zero is excluded as it is not a unit mod n^2 and would absorb every
    /// later fold.
    pub fn validate(&self, c: &BigUint) -> Result<(), CryptoError> {
        if c.is_zero() || *c >= self.n_squared() {
            return Err(CryptoError::OutOfRange);
        }
        if !c.gcd(&self.n).is_one() {
            return Err(CryptoError::NotInvertible);
        }
        Ok(())
    }

    /// Homomorphic addition: the product of two ciphertexts mod n^2
    /// decrypts to the sum of their plaintexts mod n.
    pub fn add(&self, a: &BigUint, b: &BigUint) -> BigUint {
        a * b % self.n_squared()
    }

    /// Encrypt `m` (reduced mod n) with fresh randomness.
    pub fn encrypt<R: Rng + ?Sized>(&self, m: &BigUint, rng: &mut R) -> BigUint {
        let nn = self.n_squared();
        let r = loop {
            let r = rng.gen_biguint_range(&BigUint::one(), &self.n);
            if r.gcd(&self.n).is_one() {
                break r;
            }
        };
        let gm = self.g.modpow(&(m % &self.n), &nn);
        let rn = r.modpow(&self.n, &nn);
        gm * rn % nn
    }

    /// Hex-encoded SHA-256 of the big-endian bytes of `n`.
    pub fn fingerprint(&self) -> String {
        HEXLOWER.encode(&Sha256::digest(self.n.to_bytes_be()))
    }
}

/// Paillier private key: the prime factors of `n`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKey {
    #[serde(with = "decimal")]
    p: BigUint,
    #[serde(with = "decimal")]
    q: BigUint,
}

// Keep the factors out of logs.
impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey").finish_non_exhaustive()
    }
}

impl PrivateKey {
    /// Recover the plaintext of `c` (mod n).
    pub fn decrypt(&self, public: &PublicKey, c: &BigUint) -> Result<BigUint, CryptoError> {
        public.validate(c)?;
        let n = public.n();
        let nn = public.n_squared();
        let lambda = self.lambda();
        let u = l_function(&public.g.modpow(&lambda, &nn), n);
        let mu = mod_inverse(&u, n).ok_or(CryptoError::BadGenerator)?;
        Ok(l_function(&c.modpow(&lambda, &nn), n) * mu % n)
    }

    /// Carmichael's function of n: lcm(p - 1, q - 1).
    fn lambda(&self) -> BigUint {
        (&self.p - 1u32).lcm(&(&self.q - 1u32))
    }
}

/// Generate a fresh keypair whose primes each have `prime_bits` bits.
pub fn generate_keypair<R: Rng + ?Sized>(prime_bits: u64, rng: &mut R) -> (PublicKey, PrivateKey) {
    assert!(
        prime_bits >= MIN_PRIME_BITS,
        "{prime_bits}-bit primes are too small for a Paillier key"
    );
    loop {
        let p = generate_prime(prime_bits, rng);
        let q = generate_prime(prime_bits, rng);
        if p == q {
            continue;
        }
        let n = &p * &q;
        let phi = (&p - 1u32) * (&q - 1u32);
        if !n.gcd(&phi).is_one() {
            continue;
        }
        return (PublicKey::new(n), PrivateKey { p, q });
    }
}

/// L(x) = (x - 1) / n
fn l_function(x: &BigUint, n: &BigUint) -> BigUint {
    (x - 1u32) / n
}

fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    let a = BigInt::from(a.clone());
    let m = BigInt::from(m.clone());
    let egcd = a.extended_gcd(&m);
    if !egcd.gcd.is_one() {
        return None;
    }
    egcd.x.mod_floor(&m).to_biguint()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PRIME_BITS: u64 = 128;

    fn keypair() -> (PublicKey, PrivateKey) {
        generate_keypair(TEST_PRIME_BITS, &mut rand::thread_rng())
    }

    #[test]
    fn generated_modulus_has_expected_size() {
        let (public, _) = keypair();
        assert_eq!(public.n().bits(), 2 * TEST_PRIME_BITS);
        assert_eq!(public.g(), &(public.n() + 1u32));
    }

    #[test]
    fn encrypt_then_decrypt() {
        let (public, private) = keypair();
        let mut rng = rand::thread_rng();
        for m in [0u32, 1, 2, 12345] {
            let m = BigUint::from(m);
            let c = public.encrypt(&m, &mut rng);
            assert_eq!(private.decrypt(&public, &c).unwrap(), m);
        }
    }

    #[test]
    fn encryption_is_probabilistic() {
        let (public, _) = keypair();
        let mut rng = rand::thread_rng();
        let one = BigUint::one();
        assert_ne!(public.encrypt(&one, &mut rng), public.encrypt(&one, &mut rng));
    }

    #[test]
    fn addition_is_homomorphic() {
        let (public, private) = keypair();
        let mut rng = rand::thread_rng();
        let votes = [1u32, 0, 1, 1, 0, 1];
        let sum = votes.iter().fold(PublicKey::zero(), |acc, v| {
            let c = public.encrypt(&BigUint::from(*v), &mut rng);
            public.add(&acc, &c)
        });
        assert_eq!(private.decrypt(&public, &sum).unwrap(), BigUint::from(4u32));
    }

    #[test]
    fn zero_decrypts_to_zero() {
        let (public, private) = keypair();
        assert!(private.decrypt(&public, &PublicKey::zero()).unwrap().is_zero());
    }

    #[test]
    fn arbitrary_generator_decrypts() {
        let (public, private) = keypair();
        // g = (n + 1)^3 mod n^2 is still a valid generator.
        let g = public.g().modpow(&BigUint::from(3u32), &public.n_squared());
        let public = PublicKey::from_parts(public.n().clone(), g);
        let m = BigUint::from(7u32);
        let c = public.encrypt(&m, &mut rand::thread_rng());
        assert_eq!(private.decrypt(&public, &c).unwrap(), m);
    }

    #[test]
    fn validate_rejects_out_of_range_and_non_units() {
        let (public, _) = keypair();
        assert_eq!(public.validate(&BigUint::zero()), Err(CryptoError::OutOfRange));
        assert_eq!(public.validate(&public.n_squared()), Err(CryptoError::OutOfRange));
        assert_eq!(public.validate(public.n()), Err(CryptoError::NotInvertible));
        assert_eq!(public.validate(&BigUint::one()), Ok(()));
    }

    #[test]
    fn fingerprint_depends_only_on_modulus() {
        let (a, _) = keypair();
        let (b, _) = keypair();
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn private_key_debug_hides_factors() {
        let (_, private) = keypair();
        let debug = format!("{private:?}");
        assert!(!debug.contains(&private.p.to_string()));
    }
}
