//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod decisions;
#[allow(clippy::missing_errors_doc)]
pub mod devices;
#[allow(clippy::missing_errors_doc)]
pub mod locations;
#[allow(clippy::missing_errors_doc)]
pub mod sites;

use std::str::FromStr;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Serialize;

use thiefwatch_app::ports::{CommandSink, DirectoryRepository, EventPublisher};
use thiefwatch_domain::error::{Problem, ValidationError};
use thiefwatch_domain::id::InvalidIdError;
use thiefwatch_domain::location::Location;

use crate::error::ApiError;
use crate::state::{AppState, BrokerInfo};

/// Build the `/api` sub-router.
pub fn routes<R, P, S>() -> Router<AppState<R, P, S>>
where
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    S: CommandSink + 'static,
{
    Router::new()
        .route("/topic", get(topic::<R, P, S>))
        .route("/broker", get(broker::<R, P, S>))
        // Sites
        .route(
            "/sites",
            get(sites::list::<R, P, S>).post(sites::upsert::<R, P, S>),
        )
        .route("/sites/{id}", get(sites::get::<R, P, S>))
        // Locations
        .route("/locations", get(locations::list::<R, P, S>))
        .route(
            "/locations/{site}/{zone}/{unit}",
            get(locations::get::<R, P, S>),
        )
        // Devices
        .route(
            "/devices",
            get(devices::list::<R, P, S>)
                .post(devices::upsert::<R, P, S>)
                .put(devices::upsert::<R, P, S>),
        )
        .route(
            "/devices/{id}",
            get(devices::get::<R, P, S>).delete(devices::delete::<R, P, S>),
        )
        // Decisions
        .route("/decisions", get(decisions::list::<R, P, S>))
        .route(
            "/decisions/{site}/{zone}/{unit}/reset",
            post(decisions::reset::<R, P, S>),
        )
}

#[derive(Serialize)]
pub struct TopicBody {
    pub namespace: String,
}

/// `GET /api/topic`
pub async fn topic<R, P, S>(State(state): State<AppState<R, P, S>>) -> Json<TopicBody>
where
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    S: CommandSink + 'static,
{
    Json(TopicBody {
        namespace: state.directory.namespace().await,
    })
}

/// Possible responses from the broker endpoint.
pub enum BrokerResponse {
    Ok(Json<BrokerInfo>),
    NotAdvertised,
}

impl IntoResponse for BrokerResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
            Self::NotAdvertised => StatusCode::NOT_FOUND.into_response(),
        }
    }
}

/// `GET /api/broker`
pub async fn broker<R, P, S>(State(state): State<AppState<R, P, S>>) -> BrokerResponse
where
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    S: CommandSink + 'static,
{
    match state.broker {
        Some(broker) => BrokerResponse::Ok(Json(BrokerInfo::clone(&broker))),
        None => BrokerResponse::NotAdvertised,
    }
}

/// Parse a path segment into an identifier, reporting it under `field`.
pub(crate) fn parse_id<T>(field: &str, raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = InvalidIdError>,
{
    T::from_str(raw).map_err(|err| {
        let problem = match err {
            InvalidIdError::Empty => Problem::Empty,
            InvalidIdError::Reserved(_) => Problem::Invalid("contains a reserved topic character"),
        };
        ApiError::from(ValidationError::single(field, problem))
    })
}

/// Parse a `{site}/{zone}/{unit}` path into a [`Location`].
pub(crate) fn parse_location(
    (site, zone, unit): (String, String, String),
) -> Result<Location, ApiError> {
    Ok(Location::new(
        parse_id("siteID", &site)?,
        parse_id("zoneID", &zone)?,
        parse_id("unitID", &unit)?,
    ))
}
