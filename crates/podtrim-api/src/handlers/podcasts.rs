//! Library listing and per-episode status.

use axum::extract::{Query, State};
use axum::Json;
use podtrim_models::ArtifactStatus;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

/// List every recognised artifact, relative to the library root.
pub async fn list_podcasts(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.catalog.list().await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub filename: String,
}

/// Which artifacts exist for an episode and whether a run is in flight.
pub async fn podcast_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<ArtifactStatus>> {
    let source = state.catalog.resolve_source(&query.filename)?;
    let in_flight = state.runner.is_in_flight(&source);
    let status = state.catalog.status(&query.filename, in_flight).await?;
    Ok(Json(status))
}
