//! FFprobe audio information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

/// Audio file information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    /// Duration in seconds
    pub duration: f64,
    /// File size in bytes
    pub size: u64,
    /// Bitrate in bits/second
    pub bitrate: u64,
    /// Audio codec
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u32,
}

impl AudioInfo {
    pub fn duration_ms(&self) -> u64 {
        (self.duration * 1000.0).round().max(0.0) as u64
    }

    /// Native bitrate in kbps, if ffprobe reported one.
    pub fn bitrate_kbps(&self) -> Option<u32> {
        (self.bitrate > 0).then(|| ((self.bitrate + 500) / 1000) as u32)
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    bit_rate: Option<String>,
}

/// Probe an audio file with a specific ffprobe executable.
pub async fn probe_audio_with(ffprobe: &Path, path: impl AsRef<Path>) -> MediaResult<AudioInfo> {
    let path = path.as_ref();

    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    which::which(ffprobe).map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed on {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<AudioInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let audio_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "audio")
        .ok_or_else(|| MediaError::invalid_audio("No audio stream found"))?;

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| MediaError::invalid_audio("Audio duration unavailable"))?;

    let size = probe
        .format
        .size
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    // Prefer the stream bitrate; the container figure includes cover art
    let bitrate = audio_stream
        .bit_rate
        .as_deref()
        .or(probe.format.bit_rate.as_deref())
        .and_then(|b| b.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(AudioInfo {
        duration,
        size,
        bitrate,
        codec: audio_stream.codec_name.clone().unwrap_or_default(),
        sample_rate: audio_stream
            .sample_rate
            .as_deref()
            .and_then(|r| r.parse().ok())
            .unwrap_or(0),
        channels: audio_stream.channels.unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MP3_PROBE: &str = r#"{
        "streams": [
            {"codec_type": "audio", "codec_name": "mp3", "sample_rate": "44100",
             "channels": 2, "bit_rate": "128000"},
            {"codec_type": "video", "codec_name": "mjpeg"}
        ],
        "format": {"duration": "3600.052245", "size": "57610240", "bit_rate": "128023"}
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let info = parse_probe_output(MP3_PROBE.as_bytes()).unwrap();
        assert_eq!(info.codec, "mp3");
        assert_eq!(info.size, 57_610_240);
        assert_eq!(info.bitrate, 128_000);
        assert_eq!(info.bitrate_kbps(), Some(128));
        assert_eq!(info.duration_ms(), 3_600_052);
        assert_eq!(info.channels, 2);
    }

    #[test]
    fn test_no_audio_stream_is_decode_failure() {
        let raw = r#"{"streams": [{"codec_type": "video"}], "format": {"duration": "1.0"}}"#;
        let err = parse_probe_output(raw.as_bytes()).unwrap_err();
        assert!(err.is_decode_failure());
    }

    #[test]
    fn test_missing_duration_is_decode_failure() {
        let raw = r#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        let err = parse_probe_output(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, MediaError::InvalidAudio(_)));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = probe_audio_with(Path::new("ffprobe"), "/nonexistent/ep.mp3").await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
