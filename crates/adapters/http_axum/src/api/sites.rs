//! JSON REST handlers for sites.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use thiefwatch_app::ports::{CommandSink, DirectoryRepository, EventPublisher};
use thiefwatch_domain::directory::{Site, SiteRecord, UpsertOutcome};
use thiefwatch_domain::id::SiteId;

use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<Site>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the get endpoint.
pub enum GetResponse {
    Ok(Json<Site>),
}

impl IntoResponse for GetResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the upsert endpoint.
pub enum UpsertResponse {
    Created(Json<Site>),
    Updated(Json<Site>),
}

impl IntoResponse for UpsertResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
            Self::Updated(json) => json.into_response(),
        }
    }
}

/// `GET /api/sites`
pub async fn list<R, P, S>(State(state): State<AppState<R, P, S>>) -> ListResponse
where
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    S: CommandSink + 'static,
{
    ListResponse::Ok(Json(state.directory.list_sites().await))
}

/// `GET /api/sites/{id}`
pub async fn get<R, P, S>(
    State(state): State<AppState<R, P, S>>,
    Path(id): Path<String>,
) -> Result<GetResponse, ApiError>
where
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    S: CommandSink + 'static,
{
    let site_id: SiteId = crate::api::parse_id("siteID", &id)?;
    let site = state.directory.get_site(&site_id).await?;
    Ok(GetResponse::Ok(Json(site)))
}

/// `POST /api/sites`
///
/// The body is a location record; it is merged into the existing site.
pub async fn upsert<R, P, S>(
    State(state): State<AppState<R, P, S>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<UpsertResponse, ApiError>
where
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    S: CommandSink + 'static,
{
    let record = SiteRecord::from_json(payload)?;
    let site_id = record.site_id.clone();
    let outcome = state.directory.upsert_location(record).await?;
    let site = Json(state.directory.get_site(&site_id).await?);
    Ok(match outcome {
        UpsertOutcome::Created => UpsertResponse::Created(site),
        UpsertOutcome::Updated => UpsertResponse::Updated(site),
    })
}
