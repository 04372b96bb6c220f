//! Axum HTTP front for the podtrim pipeline.
//!
//! This crate provides:
//! - Library listing and per-episode status
//! - Stage triggers that schedule background runs and answer 202
//! - Feed download triggers with SSRF-safe URL validation
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
