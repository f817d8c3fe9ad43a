//! Inspection and reset of the per-location lighting decisions.

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use thiefwatch_app::ports::{CommandSink, DirectoryRepository, EventPublisher};
use thiefwatch_app::services::correlation_engine::LocationSnapshot;
use thiefwatch_domain::location::Location;

use crate::api::parse_location;
use crate::error::ApiError;
use crate::state::AppState;

/// Outcome of a reset: the command sent, if the location was ON.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetBody {
    #[serde(flatten)]
    pub location: Location,
    pub command: Option<String>,
}

/// `GET /api/decisions`
pub async fn list<R, P, S>(State(state): State<AppState<R, P, S>>) -> Json<Vec<LocationSnapshot>>
where
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    S: CommandSink + 'static,
{
    Json(state.engine.snapshot().await)
}

/// `POST /api/decisions/{site}/{zone}/{unit}/reset`
pub async fn reset<R, P, S>(
    State(state): State<AppState<R, P, S>>,
    Path(path): Path<(String, String, String)>,
) -> Result<Json<ResetBody>, ApiError>
where
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    S: CommandSink + 'static,
{
    let location = parse_location(path)?;
    let command = state.engine.reset(&location).await;
    Ok(Json(ResetBody {
        location,
        command: command.map(|command| command.status().to_string()),
    }))
}
