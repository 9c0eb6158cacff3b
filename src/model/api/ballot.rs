use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::{error::Error, model::crypto::decimal};

/// A ballot as submitted over the wire.
///
/// The ciphertext is kept as a string here so that a malformed value is
/// reported as an invalid ciphertext rather than a generic body error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotSubmission {
    /// Decimal ciphertext in `[0, n^2)`.
    pub ciphertext: String,
    /// Fingerprint of the key the client encrypted under, if it sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pk_fingerprint: Option<String>,
}

/// A parsed ballot, ready for admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBallot {
    pub ciphertext: BigUint,
    pub pk_fingerprint: Option<String>,
}

impl EncryptedBallot {
    pub fn new(ciphertext: BigUint) -> Self {
        Self {
            ciphertext,
            pk_fingerprint: None,
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.pk_fingerprint = Some(fingerprint.into());
        self
    }
}

impl TryFrom<BallotSubmission> for EncryptedBallot {
    type Error = Error;

    fn try_from(submission: BallotSubmission) -> Result<Self, Self::Error> {
        let ciphertext =
            decimal::parse(submission.ciphertext.trim()).map_err(Error::InvalidCiphertext)?;
        Ok(Self {
            ciphertext,
            pk_fingerprint: submission.pk_fingerprint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_ciphertext() {
        let submission = BallotSubmission {
            ciphertext: "123456789".into(),
            pk_fingerprint: Some("abcd".into()),
        };
        let ballot = EncryptedBallot::try_from(submission).unwrap();
        assert_eq!(ballot.ciphertext, BigUint::from(123_456_789u32));
        assert_eq!(ballot.pk_fingerprint.as_deref(), Some("abcd"));
    }

    #[test]
    fn malformed_ciphertext_is_invalid() {
        for bad in ["", "12ab", "-5", "1.5"] {
            let submission = BallotSubmission {
                ciphertext: bad.into(),
                pk_fingerprint: None,
            };
            assert!(matches!(
                EncryptedBallot::try_from(submission),
                Err(Error::InvalidCiphertext(_))
            ));
        }
    }
}
