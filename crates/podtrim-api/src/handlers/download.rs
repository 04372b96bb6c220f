//! Feed download trigger.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::metrics::record_run_scheduled;
use crate::security::{validate_feed_url, MAX_EPISODES_PER_REQUEST};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub rss_url: String,
    /// Newest episodes to fetch; every item when omitted
    #[serde(default)]
    pub num_episodes: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct DownloadAccepted {
    pub status: &'static str,
    pub rss_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_episodes: Option<usize>,
}

/// Schedule a feed fetch and episode download.
pub async fn download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> ApiResult<(StatusCode, Json<DownloadAccepted>)> {
    let rss_url = validate_feed_url(&request.rss_url)
        .into_result()
        .map_err(ApiError::bad_request)?;

    match request.num_episodes {
        Some(0) => return Err(ApiError::bad_request("num_episodes must be at least 1")),
        Some(n) if n > MAX_EPISODES_PER_REQUEST => {
            return Err(ApiError::bad_request(format!(
                "num_episodes must be at most {MAX_EPISODES_PER_REQUEST}"
            )))
        }
        _ => {}
    }

    // Detached; the outcome is logged by the runner
    drop(state.runner.spawn_download(rss_url.clone(), request.num_episodes));
    record_run_scheduled("download");
    info!(rss_url = %rss_url, num_episodes = ?request.num_episodes, "Download accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(DownloadAccepted {
            status: "accepted",
            rss_url,
            num_episodes: request.num_episodes,
        }),
    ))
}
