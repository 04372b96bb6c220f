//! Audio encoding plan.

use serde::{Deserialize, Serialize};

/// Default audio codec for MP3 output
pub const DEFAULT_AUDIO_CODEC: &str = "libmp3lame";
/// Default size budget in MiB (keeps uploads under a 25 MB API limit)
pub const DEFAULT_SIZE_BUDGET_MB: f64 = 24.5;
/// Lowest bitrate the planner will choose, for speech intelligibility
pub const DEFAULT_MIN_BITRATE_KBPS: u32 = 32;
/// Bitrate used when a source's native bitrate cannot be probed
pub const FALLBACK_BITRATE_KBPS: u32 = 128;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Convert a MiB budget into bytes.
pub fn budget_bytes_from_mb(mb: f64) -> f64 {
    mb * BYTES_PER_MIB
}

/// How an audio artifact is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingPlan {
    pub target_bitrate_kbps: u32,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
}

fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}

impl EncodingPlan {
    pub fn new(target_bitrate_kbps: u32) -> Self {
        Self {
            target_bitrate_kbps,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
        }
    }

    /// Bitrate argument in ffmpeg notation, e.g. `"57k"`.
    pub fn bitrate_arg(&self) -> String {
        format!("{}k", self.target_bitrate_kbps)
    }

    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.bitrate_arg(),
        ]
    }

    /// Approximate output size for a given duration.
    pub fn estimated_bytes(&self, duration_secs: f64) -> u64 {
        (self.target_bitrate_kbps as f64 * 1000.0 / 8.0 * duration_secs).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_args() {
        let plan = EncodingPlan::new(57);
        assert_eq!(plan.to_ffmpeg_args(), vec!["-c:a", "libmp3lame", "-b:a", "57k"]);
    }

    #[test]
    fn test_budget_bytes() {
        assert_eq!(budget_bytes_from_mb(DEFAULT_SIZE_BUDGET_MB), 25_690_112.0);
    }

    #[test]
    fn test_estimated_bytes() {
        assert_eq!(EncodingPlan::new(64).estimated_bytes(10.0), 80_000);
    }

    #[test]
    fn test_codec_defaults_when_missing() {
        let plan: EncodingPlan = serde_json::from_str(r#"{"target_bitrate_kbps": 48}"#).unwrap();
        assert_eq!(plan.audio_codec, "libmp3lame");
    }
}
