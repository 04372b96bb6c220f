//! Advertisement interval complement.
//!
//! Converts an unordered, possibly overlapping set of ad intervals into the
//! ordered keep intervals to splice back together. A single left-to-right
//! sweep tracking the furthest cut end merges overlapping and nested ads.

use podtrim_models::{AdInterval, KeepInterval};

/// Compute the keep intervals for a recording of `total_duration_ms`.
///
/// Ads are rounded to milliseconds and clamped to `[0, total_duration_ms]`.
/// Ads that are empty or inverted after clamping, or carry non-finite times,
/// are ignored. An empty ad set yields one interval spanning the recording;
/// ads covering everything yield an empty vector.
pub fn complement(ads: &[AdInterval], total_duration_ms: u64) -> Vec<KeepInterval> {
    let mut cuts: Vec<(u64, u64)> = ads
        .iter()
        .filter_map(|ad| cut_range_ms(ad, total_duration_ms))
        .collect();
    // Stable: ties keep classifier order
    cuts.sort_by_key(|&(start, _)| start);

    let mut keep = Vec::with_capacity(cuts.len() + 1);
    let mut last_cut_end_ms = 0u64;

    for (start_ms, end_ms) in cuts {
        if start_ms > last_cut_end_ms {
            keep.push(KeepInterval::new(last_cut_end_ms, start_ms));
        }
        last_cut_end_ms = last_cut_end_ms.max(end_ms);
    }

    if last_cut_end_ms < total_duration_ms {
        keep.push(KeepInterval::new(last_cut_end_ms, total_duration_ms));
    }

    keep
}

fn cut_range_ms(ad: &AdInterval, total_duration_ms: u64) -> Option<(u64, u64)> {
    if !ad.start_time.is_finite() || !ad.end_time.is_finite() {
        return None;
    }
    let start = secs_to_ms(ad.start_time).min(total_duration_ms);
    let end = secs_to_ms(ad.end_time).min(total_duration_ms);
    (end > start).then_some((start, end))
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).round().max(0.0) as u64
}

/// Summary of a keep-interval plan.
#[derive(Debug, Clone, PartialEq)]
pub struct KeepStats {
    pub kept_ms: u64,
    pub removed_ms: u64,
    pub keep_count: usize,
    /// Ratio of kept content (0.0 to 1.0)
    pub keep_ratio: f64,
}

pub fn keep_stats(keep: &[KeepInterval], total_duration_ms: u64) -> KeepStats {
    let kept_ms: u64 = keep.iter().map(KeepInterval::duration_ms).sum();
    let keep_ratio = if total_duration_ms > 0 {
        kept_ms as f64 / total_duration_ms as f64
    } else {
        1.0
    };
    KeepStats {
        kept_ms,
        removed_ms: total_duration_ms.saturating_sub(kept_ms),
        keep_count: keep.len(),
        keep_ratio,
    }
}

/// True when the plan keeps the whole recording and re-encoding can be skipped.
pub fn is_identity(keep: &[KeepInterval], total_duration_ms: u64) -> bool {
    matches!(keep, [only] if only.spans(total_duration_ms))
}
