use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::{logging::RequestId, model::common::election::ElectionId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Election {0} already has a key")]
    AlreadyExists(ElectionId),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),
    #[error("Ballot was encrypted under a different key than election {0} uses")]
    KeyMismatch(ElectionId),
    #[error("Voter has already cast a ballot in election {0}")]
    DuplicateVote(ElectionId),
    #[error("Election {0} is closed")]
    ElectionClosed(ElectionId),
    #[error("Election {election_id} already holds {ballots_received} of {eligible_count} eligible ballots")]
    RosterExceeded {
        election_id: ElectionId,
        ballots_received: u64,
        eligible_count: u64,
    },
    #[error("Election {0} is still open")]
    NotReady(ElectionId),
    #[error("Concurrent update to election {0}, retry the request")]
    Contention(ElectionId),
    #[error("Decryption failed for election {election_id}: {reason}")]
    DecryptionError {
        election_id: ElectionId,
        reason: String,
    },
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl Error {
    /// Short machine-readable name, used as the `error` field of response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AlreadyExists(_) => "AlreadyExists",
            Self::NotFound(_) => "NotFound",
            Self::InvalidCiphertext(_) => "InvalidCiphertext",
            Self::KeyMismatch(_) => "KeyMismatch",
            Self::DuplicateVote(_) => "DuplicateVote",
            Self::ElectionClosed(_) => "ElectionClosed",
            Self::RosterExceeded { .. } => "RosterExceeded",
            Self::NotReady(_) => "NotReady",
            Self::Contention(_) => "Contention",
            Self::DecryptionError { .. } => "DecryptionError",
            Self::BadRequest(_) => "BadRequest",
            Self::Unauthorized(_) => "Unauthorized",
            Self::Internal(_) | Self::Db(_) => "Internal",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::InvalidCiphertext(_) | Self::KeyMismatch(_) | Self::BadRequest(_) => {
                Status::BadRequest
            }
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::NotFound(_) => Status::NotFound,
            Self::AlreadyExists(_)
            | Self::DuplicateVote(_)
            | Self::ElectionClosed(_)
            | Self::RosterExceeded { .. }
            | Self::NotReady(_) => Status::Conflict,
            Self::Contention(_) => Status::ServiceUnavailable,
            Self::DecryptionError { .. } | Self::Internal(_) | Self::Db(_) => {
                Status::InternalServerError
            }
        }
    }
}

/// Body sent alongside every error status.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ErrorBody {
    /// Body for an error Rocket raised itself, before any handler ran.
    pub(crate) fn for_status(status: Status) -> Self {
        let error = match status.code {
            401 => "Unauthorized",
            404 => "NotFound",
            500..=599 => "Internal",
            _ => "BadRequest",
        };
        Self {
            error,
            message: status.reason_lossy().to_lowercase(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let id = RequestId::of(req);
        // Don't leak database internals to clients.
        let message = match self {
            Self::Db(ref e) => {
                error!("req{id}: database error: {e}");
                "internal server error".to_string()
            }
            Self::Internal(ref e) => {
                error!("req{id}: internal error: {e}");
                "internal server error".to_string()
            }
            ref other => other.to_string(),
        };
        let body = ErrorBody {
            error: self.kind(),
            message,
        };
        (status, Json(body)).respond_to(req)
    }
}
