//! Application state.

use std::sync::Arc;

use podtrim_worker::{Catalog, PipelineResult, PipelineRunner, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub catalog: Arc<Catalog>,
    pub runner: PipelineRunner,
}

impl AppState {
    pub fn new(config: ApiConfig, catalog: Catalog, runner: PipelineRunner) -> Self {
        Self {
            config,
            catalog: Arc::new(catalog),
            runner,
        }
    }

    /// Wire the pipeline selected by `worker`.
    pub fn from_config(config: ApiConfig, worker: &WorkerConfig) -> PipelineResult<Self> {
        let runner = PipelineRunner::from_config(worker)?;
        Ok(Self::new(config, Catalog::new(&worker.library_dir), runner))
    }
}
