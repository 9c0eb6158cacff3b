use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::{error::ErrorBody, logging::RequestId};

mod admin;
mod public;
mod voter;

pub use voter::VOTER_ID_HEADER;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(voter::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Give errors raised by Rocket itself, such as unparsable paths or bodies,
/// the same JSON shape as ours.
#[catch(default)]
fn default_catcher(status: Status, req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    debug!("req{}: {status} raised before reaching a handler", RequestId::of(req));
    (status, Json(ErrorBody::for_status(status)))
}
