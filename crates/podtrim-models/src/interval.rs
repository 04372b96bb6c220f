//! Keep intervals: the spans of a recording retained after ad removal.

use serde::{Deserialize, Serialize};

/// Half-open `[start_ms, end_ms)` range to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeepInterval {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl KeepInterval {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Start in seconds, as ffmpeg's `atrim` expects.
    pub fn start_secs(&self) -> f64 {
        self.start_ms as f64 / 1000.0
    }

    pub fn end_secs(&self) -> f64 {
        self.end_ms as f64 / 1000.0
    }

    /// True when the interval covers the whole `[0, total_ms)` range.
    pub fn spans(&self, total_ms: u64) -> bool {
        self.start_ms == 0 && self.end_ms >= total_ms
    }
}

impl From<(u64, u64)> for KeepInterval {
    fn from((start_ms, end_ms): (u64, u64)) -> Self {
        Self { start_ms, end_ms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_helpers() {
        let interval = KeepInterval::from((25_000, 30_000));
        assert_eq!(interval.duration_ms(), 5_000);
        assert_eq!(interval.start_secs(), 25.0);
        assert!(!interval.spans(30_000));
        assert!(KeepInterval::new(0, 30_000).spans(30_000));
    }
}
