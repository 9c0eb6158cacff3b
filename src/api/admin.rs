use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{api::key::KeyDescription, common::election::ElectionId},
    tally::Tally,
};

pub fn routes() -> Vec<Route> {
    routes![create_key]
}

/// Issue the keypair for a new election.
///
/// Access control is the job of whatever sits in front of this service.
#[post("/elections/<election_id>/key")]
async fn create_key(
    election_id: ElectionId,
    tally: &State<Tally>,
) -> Result<(Status, Json<KeyDescription>)> {
    let public = tally.keys().create_key(election_id).await?;
    Ok((Status::Created, Json(KeyDescription::from(&public))))
}
