//! JSON REST handlers for devices.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use thiefwatch_app::ports::{CommandSink, DirectoryRepository, EventPublisher};
use thiefwatch_domain::device::DeviceRecord;
use thiefwatch_domain::directory::UpsertOutcome;
use thiefwatch_domain::error::{NotFoundError, WatchError};
use thiefwatch_domain::id::DeviceId;

use crate::api::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<DeviceRecord>>),
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
    Ok(Json<DeviceRecord>),
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
    Created(Json<DeviceRecord>),
    Updated(Json<DeviceRecord>),
}

impl IntoResponse for UpsertResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
            Self::Updated(json) => json.into_response(),
        }
    }
}

/// Possible responses from the delete endpoint.
pub enum DeleteResponse {
    NoContent,
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/devices`
pub async fn list<R, P, S>(State(state): State<AppState<R, P, S>>) -> ListResponse
where
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    S: CommandSink + 'static,
{
    ListResponse::Ok(Json(state.directory.list_devices().await))
}

/// `GET /api/devices/{id}`
pub async fn get<R, P, S>(
    State(state): State<AppState<R, P, S>>,
    Path(id): Path<String>,
) -> Result<GetResponse, ApiError>
where
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    S: CommandSink + 'static,
{
    let device_id: DeviceId = parse_id("deviceID", &id)?;
    let device = state.directory.get_device(&device_id).await?;
    Ok(GetResponse::Ok(Json(device)))
}

/// `POST /api/devices` and `PUT /api/devices`
///
/// Every schema violation of the body is reported at once.
pub async fn upsert<R, P, S>(
    State(state): State<AppState<R, P, S>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<UpsertResponse, ApiError>
where
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    S: CommandSink + 'static,
{
    let (stored, outcome) = state.directory.register_device(payload).await?;
    Ok(match outcome {
        UpsertOutcome::Created => UpsertResponse::Created(Json(stored)),
        UpsertOutcome::Updated => UpsertResponse::Updated(Json(stored)),
    })
}

/// `DELETE /api/devices/{id}`
pub async fn delete<R, P, S>(
    State(state): State<AppState<R, P, S>>,
    Path(id): Path<String>,
) -> Result<DeleteResponse, ApiError>
where
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    S: CommandSink + 'static,
{
    let device_id: DeviceId = parse_id("deviceID", &id)?;
    if state.directory.remove_device(&device_id).await? {
        Ok(DeleteResponse::NoContent)
    } else {
        Err(WatchError::from(NotFoundError::Device(device_id)).into())
    }
}
