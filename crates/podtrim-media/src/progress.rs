//! FFmpeg `-progress` stream parsing.

/// Snapshot of one `-progress` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FfmpegProgress {
    /// Audio written so far, in milliseconds of output time
    pub out_time_ms: u64,
    /// Bytes written so far
    pub total_size: u64,
    /// Encoding speed relative to realtime (e.g. 30.0 = 30x)
    pub speed: f64,
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Share of `expected_ms` written so far, 0 to 100.
    pub fn percentage(&self, expected_ms: u64) -> f64 {
        if expected_ms == 0 {
            return 0.0;
        }
        (self.out_time_ms as f64 / expected_ms as f64 * 100.0).min(100.0)
    }

    /// Seconds left at the current speed.
    pub fn eta_seconds(&self, expected_ms: u64) -> Option<f64> {
        if self.speed <= 0.0 || self.out_time_ms == 0 {
            return None;
        }
        let remaining_ms = expected_ms.saturating_sub(self.out_time_ms);
        Some(remaining_ms as f64 / 1000.0 / self.speed)
    }
}

/// Accumulates `key=value` lines into snapshots.
#[derive(Debug, Default)]
pub(crate) struct ProgressParser {
    current: FfmpegProgress,
}

impl ProgressParser {
    /// Fold one stderr line in.
    ///
    /// Returns a snapshot at each `progress=` marker, which ends a block.
    /// Lines that are not part of the progress stream return `Err(line)` so
    /// the caller can keep them for error reports.
    pub(crate) fn feed<'a>(&mut self, line: &'a str) -> Result<Option<FfmpegProgress>, &'a str> {
        let Some((key, value)) = line.trim().split_once('=') else {
            return Err(line);
        };
        match key {
            // out_time_ms is microseconds too, despite its name
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<u64>() {
                    self.current.out_time_ms = us / 1000;
                }
            }
            "total_size" => {
                if let Ok(size) = value.parse() {
                    self.current.total_size = size;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.current.speed = speed;
                }
            }
            "progress" => {
                self.current.is_complete = value == "end";
                return Ok(Some(self.current.clone()));
            }
            "bitrate" | "out_time" | "dup_frames" | "drop_frames" | "frame" | "fps" => {}
            k if k.starts_with("stream_") => {}
            _ => return Err(line),
        }
        Ok(None)
    }
}
