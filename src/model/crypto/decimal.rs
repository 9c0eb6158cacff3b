//! Serialise big integers as base-10 strings, the wire format for key
//! material and ciphertexts.
//!
//! Use as `#[serde(with = "decimal")]`.

use num_bigint::BigUint;
use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_str_radix(10))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
where
    D: Deserializer<'de>,
{
    let string = String::deserialize(deserializer)?;
    parse(&string).map_err(D::Error::custom)
}

/// Strictly parse a decimal string: ASCII digits only, no sign, no separators.
pub fn parse(string: &str) -> Result<BigUint, String> {
    if string.is_empty() {
        return Err("empty decimal string".to_string());
    }
    if let Some(bad) = string.chars().find(|c| !c.is_ascii_digit()) {
        return Err(format!("unexpected character {bad:?} in decimal string"));
    }
    BigUint::parse_bytes(string.as_bytes(), 10)
        .ok_or_else(|| format!("invalid decimal string {string:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_plain_digits() {
        assert_eq!(parse("0").unwrap(), BigUint::from(0u32));
        assert_eq!(
            parse("340282366920938463463374607431768211457").unwrap(),
            (BigUint::from(1u32) << 128u32) + 1u32
        );
    }

    #[test]
    fn parse_rejects_junk() {
        assert!(parse("").is_err());
        assert!(parse("-1").is_err());
        assert!(parse("+1").is_err());
        assert!(parse("1_000").is_err());
        assert!(parse("0x10").is_err());
        assert!(parse(" 12").is_err());
    }
}
