use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    serde::json::Json,
    Request, Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            ballot::{BallotSubmission, EncryptedBallot},
            receipt::Receipt,
        },
        common::election::{ElectionId, VoterId},
    },
    tally::Tally,
};

/// Header carrying the voter's identity, set by the authenticating proxy.
pub const VOTER_ID_HEADER: &str = "X-Voter-Id";

pub fn routes() -> Vec<Route> {
    routes![submit_ballot]
}

/// The identity of the voter making a request.
///
/// Authentication happens upstream; we only check the header is present and
/// well formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterIdentity(pub VoterId);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for VoterIdentity {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let raw = match req.headers().get_one(VOTER_ID_HEADER) {
            Some(raw) => raw,
            None => {
                return Outcome::Error((
                    Status::Unauthorized,
                    Error::Unauthorized(format!("missing `{VOTER_ID_HEADER}` header")),
                ))
            }
        };
        match VoterId::new(raw) {
            Some(voter) => Outcome::Success(Self(voter)),
            None => Outcome::Error((
                Status::BadRequest,
                Error::BadRequest(format!("malformed `{VOTER_ID_HEADER}` header")),
            )),
        }
    }
}

#[post("/elections/<election_id>/ballots", data = "<submission>", format = "json")]
async fn submit_ballot(
    election_id: ElectionId,
    voter: std::result::Result<VoterIdentity, Error>,
    submission: Json<BallotSubmission>,
    tally: &State<Tally>,
) -> Result<Json<Receipt>> {
    let VoterIdentity(voter) = voter?;
    let ballot = EncryptedBallot::try_from(submission.into_inner())?;
    let receipt = tally.submit(election_id, voter, ballot).await?;
    Ok(Json(receipt))
}
