//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use podtrim_models::artifact::partial_path;
use podtrim_models::EncodingPlan;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{remove_quietly, rename_into_place};
use crate::progress::ProgressParser;

/// Lines of non-progress stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Length of the audio the command will write, for progress logs
    expected_ms: Option<u64>,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            expected_ms: None,
        }
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Read the filter graph from a file instead of the command line.
    pub fn filter_complex_script(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_string_lossy().to_string();
        self.output_arg("-filter_complex_script").output_arg(path)
    }

    /// Select an output stream or filter label.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Copy global metadata (ID3 tags) from the input.
    pub fn keep_metadata(self) -> Self {
        self.output_arg("-map_metadata").output_arg("0")
    }

    /// Apply codec and bitrate from an encoding plan.
    pub fn encoding(self, plan: &EncodingPlan) -> Self {
        self.output_args(plan.to_ffmpeg_args())
    }

    /// Force the output container format.
    ///
    /// Needed whenever the output path does not end in a known extension.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.output_arg("-f").output_arg(format)
    }

    /// Length of the output in milliseconds, when known.
    pub fn expected_ms(mut self, ms: u64) -> Self {
        self.expected_ms = Some(ms);
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-nostdin", "-v", "error", "-progress", "pipe:2", "-nostats"]
            .into_iter()
            .map(String::from)
            .collect();

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with progress logging and a timeout.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    binary: PathBuf,
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            timeout_secs: None,
        }
    }

    /// Use a specific ffmpeg executable instead of the one on PATH.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command to completion.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        which::which(&self.binary).map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", self.binary.display(), args.join(" "));

        let started = Instant::now();
        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("stderr not captured", None, None))?;
        let mut reader = BufReader::new(stderr).lines();

        // Progress blocks are logged; everything else is kept as a tail
        let expected_ms = cmd.expected_ms;
        let stderr_handle = tokio::spawn(async move {
            let mut parser = ProgressParser::default();
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                match parser.feed(&line) {
                    Ok(Some(progress)) => match expected_ms {
                        Some(ms) => debug!(
                            percent = progress.percentage(ms).round(),
                            eta_secs = ?progress.eta_seconds(ms),
                            speed = progress.speed,
                            "FFmpeg progress"
                        ),
                        None => debug!(
                            out_time_ms = progress.out_time_ms,
                            speed = progress.speed,
                            "FFmpeg progress"
                        ),
                    },
                    Ok(None) => {}
                    Err(other) if other.trim().is_empty() => {}
                    Err(_) => {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
            }

            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let result = self.wait_for_completion(&mut child).await;
        let stderr_tail = stderr_handle.await.unwrap_or_default();

        metrics::histogram!("podtrim_ffmpeg_duration_seconds").record(started.elapsed().as_secs_f64());

        match result {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => {
                metrics::counter!("podtrim_ffmpeg_failures_total").increment(1);
                let stderr = (!stderr_tail.is_empty()).then_some(stderr_tail);
                Err(MediaError::ffmpeg_failed(
                    "FFmpeg exited with non-zero status",
                    stderr,
                    status.code(),
                ))
            }
            Err(e) => {
                metrics::counter!("podtrim_ffmpeg_failures_total").increment(1);
                Err(e)
            }
        }
    }

    /// Run a command that writes `output` atomically.
    ///
    /// `build` receives the partial path FFmpeg must write to. The partial
    /// file is renamed onto `output` on success and removed on failure.
    pub async fn run_to<F>(&self, output: &Path, build: F) -> MediaResult<()>
    where
        F: FnOnce(&Path) -> FfmpegCommand,
    {
        let partial = partial_path(output);
        let cmd = build(&partial);

        if let Err(e) = self.run(&cmd).await {
            remove_quietly(&partial).await;
            return Err(e);
        }
        if let Err(e) = rename_into_place(&partial, output).await {
            remove_quietly(&partial).await;
            return Err(e);
        }
        Ok(())
    }

    /// Wait for the child, killing it on timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<ExitStatus> {
        let Some(secs) = self.timeout_secs else {
            return Ok(child.wait().await?);
        };

        match tokio::time::timeout(Duration::from_secs(secs), child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => {
                warn!("FFmpeg timed out after {} seconds, killing process", secs);
                let _ = child.kill().await;
                Err(MediaError::Timeout(secs))
            }
        }
    }
}
