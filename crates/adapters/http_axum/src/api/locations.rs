//! JSON REST handlers for locations.

use axum::Json;
use axum::extract::{Path, State};

use thiefwatch_app::ports::{CommandSink, DirectoryRepository, EventPublisher};
use thiefwatch_domain::directory::Unit;
use thiefwatch_domain::location::Location;

use crate::api::parse_location;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/locations`
pub async fn list<R, P, S>(State(state): State<AppState<R, P, S>>) -> Json<Vec<Location>>
where
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    S: CommandSink + 'static,
{
    Json(state.directory.list_locations().await)
}

/// `GET /api/locations/{site}/{zone}/{unit}`
pub async fn get<R, P, S>(
    State(state): State<AppState<R, P, S>>,
    Path(path): Path<(String, String, String)>,
) -> Result<Json<Unit>, ApiError>
where
    R: DirectoryRepository + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    S: CommandSink + 'static,
{
    let location = parse_location(path)?;
    Ok(Json(state.directory.get_location(&location).await?))
}
