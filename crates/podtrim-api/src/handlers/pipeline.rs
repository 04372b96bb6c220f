//! Stage triggers.
//!
//! Every trigger validates its preconditions synchronously, schedules a
//! background run and answers `202 Accepted`. Failures inside the run are
//! logged and counted; callers poll the status endpoint for the result.

use std::path::Path;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use podtrim_models::ArtifactPaths;
use podtrim_worker::catalog::first_existing;
use podtrim_worker::{PipelineError, PipelineJob};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::metrics::{record_run_rejected, record_run_scheduled};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FilenameRequest {
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
    pub run_id: String,
    pub filename: String,
    /// Artifact the run is expected to produce
    pub output_filename: String,
}

/// Schedule Transcribe then Classify for an episode.
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<FilenameRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let source = state.catalog.resolve_source(&request.filename)?;
    require_exists(&state, &source).await?;
    let output = ArtifactPaths::for_source(&source).analysis;

    schedule(&state, PipelineJob::Analyze { source }, request.filename, &output)
}

/// Schedule removal of the classified advertisements.
pub async fn splice(
    State(state): State<AppState>,
    Json(request): Json<FilenameRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let source = state.catalog.resolve_source(&request.filename)?;
    require_exists(&state, &source).await?;
    let paths = ArtifactPaths::for_source(&source);
    if first_existing(&paths.analysis_candidates()).await.is_none() {
        return Err(ApiError::not_found(format!(
            "no ad analysis for {}; run /analyze first",
            state.catalog.relative_name(&source)
        )));
    }

    let output = paths.no_ads.clone();
    schedule(&state, PipelineJob::Splice { source }, request.filename, &output)
}

/// Schedule re-encoding of an audio artifact to fit the size budget.
pub async fn compress(
    State(state): State<AppState>,
    Json(request): Json<FilenameRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let audio = state.catalog.resolve_audio(&request.filename).await.map_err(|e| match e {
        PipelineError::NotFound(path) => {
            ApiError::not_found(state.catalog.relative_name(&path))
        }
        other => other.into(),
    })?;
    let source = state.catalog.resolve_source(&request.filename)?;
    let output = ArtifactPaths::for_source(&audio).compressed;

    schedule(
        &state,
        PipelineJob::Compress { source, audio },
        request.filename,
        &output,
    )
}

fn schedule(
    state: &AppState,
    job: PipelineJob,
    filename: String,
    output: &Path,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let name = job.name();
    let run = state.runner.spawn(job).inspect_err(|e| {
        if matches!(e, PipelineError::Busy(_)) {
            record_run_rejected(name);
        }
    })?;
    record_run_scheduled(name);
    info!(run_id = %run.run_id, job = name, filename = %filename, "Run accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted",
            run_id: run.run_id.to_string(),
            filename,
            output_filename: state.catalog.relative_name(output),
        }),
    ))
}

async fn require_exists(state: &AppState, path: &Path) -> ApiResult<()> {
    if first_existing(&[path]).await.is_some() {
        Ok(())
    } else {
        Err(ApiError::not_found(state.catalog.relative_name(path)))
    }
}
