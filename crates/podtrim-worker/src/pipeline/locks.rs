//! Single-flight leases keyed by source recording.
//!
//! At most one run per source executes at a time within this process. A
//! second trigger for a leased source is refused rather than queued.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Default)]
pub struct ArtifactLocks {
    held: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ArtifactLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease for `source`, or fail with `Busy` if it is held.
    pub fn try_acquire(&self, source: &Path) -> PipelineResult<ArtifactLease> {
        let mut held = self.lock();
        if !held.insert(source.to_path_buf()) {
            return Err(PipelineError::Busy(source.display().to_string()));
        }
        debug!(source = %source.display(), "Lease acquired");
        Ok(ArtifactLease {
            source: source.to_path_buf(),
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_held(&self, source: &Path) -> bool {
        self.lock().contains(source)
    }

    /// Number of leases currently held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        // The set stays consistent even if a holder panicked
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Released when dropped.
#[derive(Debug)]
pub struct ArtifactLease {
    source: PathBuf,
    held: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ArtifactLease {
    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl Drop for ArtifactLease {
    fn drop(&mut self) {
        let mut held = self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        held.remove(&self.source);
        debug!(source = %self.source.display(), "Lease released");
    }
}
