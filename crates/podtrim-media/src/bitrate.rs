//! Size-budget bitrate planning.

use podtrim_models::EncodingPlan;

use crate::error::{MediaError, MediaResult};

/// Pick the bitrate that makes `duration_sec` of audio fit `size_budget_bytes`.
///
/// `target = budget * 8 / duration / 1000` kbps, raised to `min_bitrate_kbps`
/// and truncated to a whole kbps. Only call this for files that exceed the
/// budget; the planner does not check that itself.
pub fn plan(size_budget_bytes: f64, duration_sec: f64, min_bitrate_kbps: u32) -> MediaResult<EncodingPlan> {
    if !duration_sec.is_finite() || duration_sec <= 0.0 {
        return Err(MediaError::precondition(format!(
            "duration must be positive, got {duration_sec}"
        )));
    }
    if !size_budget_bytes.is_finite() || size_budget_bytes < 0.0 {
        return Err(MediaError::precondition(format!(
            "size budget must be non-negative, got {size_budget_bytes}"
        )));
    }

    let target_kbps = size_budget_bytes * 8.0 / duration_sec / 1000.0;
    let final_kbps = target_kbps.max(min_bitrate_kbps as f64);
    let kbps = final_kbps.floor().min(u32::MAX as f64) as u32;

    Ok(EncodingPlan::new(kbps))
}

/// Whether a file of `size_bytes` needs compressing to meet the budget.
pub fn exceeds_budget(size_bytes: u64, size_budget_bytes: f64) -> bool {
    size_bytes as f64 > size_budget_bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use podtrim_models::encoding::budget_bytes_from_mb;

    #[test]
    fn test_hour_long_episode_at_default_budget() {
        let plan = plan(budget_bytes_from_mb(24.5), 3600.0, 32).unwrap();
        // 25_690_112 * 8 / 3600 / 1000 = 57.09
        assert_eq!(plan.target_bitrate_kbps, 57);
        assert_eq!(plan.bitrate_arg(), "57k");
    }

    #[test]
    fn test_floor_applies_to_tiny_budget() {
        let plan = plan(budget_bytes_from_mb(1.0), 3600.0, 32).unwrap();
        assert_eq!(plan.target_bitrate_kbps, 32);
    }

    #[test]
    fn test_short_file_gets_high_bitrate() {
        let plan = plan(budget_bytes_from_mb(24.5), 600.0, 32).unwrap();
        assert_eq!(plan.target_bitrate_kbps, 342);
    }

    #[test]
    fn test_zero_duration_is_precondition_violation() {
        assert!(matches!(
            plan(1_000_000.0, 0.0, 32),
            Err(MediaError::Precondition(_))
        ));
        assert!(matches!(
            plan(1_000_000.0, -3.0, 32),
            Err(MediaError::Precondition(_))
        ));
        assert!(matches!(
            plan(1_000_000.0, f64::NAN, 32),
            Err(MediaError::Precondition(_))
        ));
    }

    #[test]
    fn test_negative_budget_is_precondition_violation() {
        assert!(matches!(
            plan(-1.0, 60.0, 32),
            Err(MediaError::Precondition(_))
        ));
    }

    #[test]
    fn test_exceeds_budget() {
        let budget = budget_bytes_from_mb(24.5);
        assert!(!exceeds_budget(25_690_112, budget));
        assert!(exceeds_budget(25_690_113, budget));
    }
}
