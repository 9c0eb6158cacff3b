use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::One;
use rand::Rng;

/// Odd primes below 256, used to sieve out most composites before Miller-Rabin.
#[rustfmt::skip]
const SMALL_PRIMES: [u32; 53] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71,
    73, 79, 83, 89, 97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151,
    157, 163, 167, 173, 179, 181, 191, 193, 197, 199, 211, 223, 227, 229, 233,
    239, 241, 251,
];

/// Miller-Rabin rounds; error probability is at most 4^-40 per candidate.
const MILLER_RABIN_ROUNDS: usize = 40;

/// Generate a random probable prime of exactly `bits` bits.
///
/// The top two bits are always set, so the product of two such primes has
/// exactly `2 * bits` bits.
pub fn generate_prime<R: Rng + ?Sized>(bits: u64, rng: &mut R) -> BigUint {
    assert!(bits >= 8, "refusing to generate a {bits}-bit prime");
    loop {
        let mut candidate = rng.gen_biguint(bits);
        candidate.set_bit(bits - 1, true);
        candidate.set_bit(bits - 2, true);
        candidate.set_bit(0, true);
        if is_probable_prime(&candidate, rng) {
            return candidate;
        }
    }
}

/// Probabilistic primality test: trial division by small primes, then
/// Miller-Rabin with random bases.
pub fn is_probable_prime<R: Rng + ?Sized>(n: &BigUint, rng: &mut R) -> bool {
    let two = BigUint::from(2u32);
    if *n < two {
        return false;
    }
    if *n == two {
        return true;
    }
    if n.is_even() {
        return false;
    }
    for small in SMALL_PRIMES {
        let small = BigUint::from(small);
        if *n == small {
            return true;
        }
        if (n % &small) == BigUint::from(0u32) {
            return false;
        }
    }

    // Every odd composite below 257^2 has been sieved out, so n > 251 here.
    let n_minus_one = n - 1u32;
    let s = n_minus_one
        .trailing_zeros()
        .expect("n - 1 is even and non-zero");
    let d = &n_minus_one >> s;

    'witness: for _ in 0..MILLER_RABIN_ROUNDS {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = &x * &x % n;
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_small_primes_and_composites() {
        let mut rng = rand::thread_rng();
        let primes = [2u32, 3, 5, 97, 251, 257, 7919, 104_729];
        let composites = [0u32, 1, 4, 9, 91, 561, 65_537 * 3, 7919 * 7919];
        for p in primes {
            assert!(is_probable_prime(&BigUint::from(p), &mut rng), "{p}");
        }
        for c in composites {
            assert!(!is_probable_prime(&BigUint::from(c), &mut rng), "{c}");
        }
    }

    #[test]
    fn rejects_carmichael_numbers() {
        let mut rng = rand::thread_rng();
        // Strong pseudoprimes to several small bases.
        for c in [3_215_031_751u64, 2_152_302_898_747, 3_474_749_660_383] {
            assert!(!is_probable_prime(&BigUint::from(c), &mut rng), "{c}");
        }
    }

    #[test]
    fn recognises_large_known_prime() {
        let mut rng = rand::thread_rng();
        // 2^127 - 1 is a Mersenne prime.
        let m127 = (BigUint::from(1u32) << 127u32) - 1u32;
        assert!(is_probable_prime(&m127, &mut rng));
        assert!(!is_probable_prime(&(&m127 * &m127), &mut rng));
    }

    #[test]
    fn generated_primes_have_exact_length() {
        let mut rng = rand::thread_rng();
        for bits in [16, 64, 128] {
            let p = generate_prime(bits, &mut rng);
            assert_eq!(p.bits(), bits);
            assert!(is_probable_prime(&p, &mut rng));
        }
    }
}
