//! Splice keep intervals of a recording into a single file.
//!
//! The source is decoded once; an `atrim`/`concat` filter graph slices the
//! keep intervals and joins them before a single encode. Large graphs are
//! passed through a script file to stay clear of command-line limits.

use std::path::Path;

use podtrim_models::{EncodingPlan, KeepInterval};
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Interval count above which the filter graph goes to a script file.
pub const DEFAULT_MAX_INLINE_INTERVALS: usize = 64;

/// Build the `filter_complex` graph that keeps `keep` and labels it `[out]`.
pub fn build_concat_filter(keep: &[KeepInterval]) -> String {
    let mut graph = String::new();
    for (i, interval) in keep.iter().enumerate() {
        graph.push_str(&format!(
            "[0:a]atrim=start={:.3}:end={:.3},asetpts=PTS-STARTPTS[a{i}];",
            interval.start_secs(),
            interval.end_secs()
        ));
    }
    for i in 0..keep.len() {
        graph.push_str(&format!("[a{i}]"));
    }
    graph.push_str(&format!("concat=n={}:v=0:a=1[out]", keep.len()));
    graph
}

/// Write `input` with only the `keep` intervals to `output`, encoded per `plan`.
pub async fn splice_audio(
    runner: &FfmpegRunner,
    input: &Path,
    output: &Path,
    keep: &[KeepInterval],
    plan: &EncodingPlan,
    max_inline_intervals: usize,
) -> MediaResult<()> {
    if keep.is_empty() {
        return Err(MediaError::NothingToKeep);
    }

    let graph = build_concat_filter(keep);
    let kept_ms: u64 = keep.iter().map(KeepInterval::duration_ms).sum();

    info!(
        input = %input.display(),
        output = %output.display(),
        intervals = keep.len(),
        bitrate = %plan.bitrate_arg(),
        "Splicing keep intervals"
    );

    // Holds the script file, if any, until FFmpeg has finished
    let script_dir = if keep.len() > max_inline_intervals {
        let dir = tempfile::tempdir()?;
        tokio::fs::write(dir.path().join("splice.filter"), &graph).await?;
        debug!(intervals = keep.len(), "Using filter script file");
        Some(dir)
    } else {
        None
    };

    runner
        .run_to(output, |partial| {
            let cmd = FfmpegCommand::new(input, partial);
            let cmd = match &script_dir {
                Some(dir) => cmd.filter_complex_script(dir.path().join("splice.filter")),
                None => cmd.filter_complex(graph.clone()),
            };
            cmd.map("[out]")
                .keep_metadata()
                .encoding(plan)
                .format("mp3")
                .expected_ms(kept_ms)
        })
        .await
}
