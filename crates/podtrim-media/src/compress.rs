//! Whole-file re-encode at a planned bitrate.

use std::path::Path;

use podtrim_models::EncodingPlan;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Re-encode the audio of `input` into `output` per `plan`.
pub async fn encode_audio(
    runner: &FfmpegRunner,
    input: &Path,
    output: &Path,
    plan: &EncodingPlan,
) -> MediaResult<()> {
    info!(
        input = %input.display(),
        output = %output.display(),
        bitrate = %plan.bitrate_arg(),
        "Re-encoding audio"
    );

    runner
        .run_to(output, |partial| build_encode_command(input, partial, plan))
        .await
}

fn build_encode_command(input: &Path, output: &Path, plan: &EncodingPlan) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .map("0:a")
        .keep_metadata()
        .encoding(plan)
        .format("mp3")
}
