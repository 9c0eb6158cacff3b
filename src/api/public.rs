use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{key::KeyDescription, status::StatusReport},
        common::election::ElectionId,
    },
    tally::{ElectionResult, Tally},
};

pub fn routes() -> Vec<Route> {
    routes![get_public_key, get_status, get_result]
}

#[get("/elections/<election_id>/public_key")]
async fn get_public_key(
    election_id: ElectionId,
    tally: &State<Tally>,
) -> Result<Json<KeyDescription>> {
    let public = tally.keys().public_key(election_id).await?;
    Ok(Json(KeyDescription::from(&public)))
}

#[get("/elections/<election_id>/status")]
async fn get_status(election_id: ElectionId, tally: &State<Tally>) -> Result<Json<StatusReport>> {
    Ok(Json(tally.status(election_id).await?))
}

/// The result, or `NotReady` until the election has closed.
#[get("/elections/<election_id>/result")]
async fn get_result(
    election_id: ElectionId,
    tally: &State<Tally>,
) -> Result<Json<ElectionResult>> {
    Ok(Json(tally.result(election_id).await?))
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client, serde::json::Value};

    use super::*;
    use crate::model::common::election::ElectionState;

    #[backend_test]
    async fn unknown_election_is_not_found(client: Client) {
        for path in [
            uri!(get_public_key(9)),
            uri!(get_status(9)),
            uri!(get_result(9)),
        ] {
            let response = client.get(path).dispatch().await;
            assert_eq!(Status::NotFound, response.status());
            let body = response.into_json::<Value>().await.unwrap();
            assert_eq!(body["error"], "NotFound");
        }
    }

    #[backend_test]
    async fn fresh_election_is_open_and_not_ready(client: Client) {
        client.post("/elections/3/key").dispatch().await;

        let response = client.get(uri!(get_public_key(3))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert!(response.into_json::<KeyDescription>().await.is_some());

        let response = client.get(uri!(get_status(3))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let status = response.into_json::<StatusReport>().await.unwrap();
        assert_eq!(status.state, ElectionState::Open);
        assert_eq!(status.ballots_received, 0);
        assert!(!status.finalization_failed);

        let response = client.get(uri!(get_result(3))).dispatch().await;
        assert_eq!(Status::Conflict, response.status());
        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["error"], "NotReady");
    }

    #[backend_test]
    async fn malformed_election_id_is_unprocessable(client: Client) {
        let response = client.get("/elections/not-a-number/status").dispatch().await;
        assert_eq!(Status::UnprocessableEntity, response.status());
        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["error"], "BadRequest");
        assert!(body["message"].is_string());
    }

    #[backend_test]
    async fn unknown_path_is_json_not_found(client: Client) {
        let response = client.get("/nowhere").dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["error"], "NotFound");
    }
}
