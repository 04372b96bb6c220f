#![deny(unreachable_patterns)]
//! Audio processing for the podtrim pipeline.
//!
//! This crate provides:
//! - The ad-interval complement that yields keep intervals
//! - Size-budget bitrate planning
//! - Type-safe FFmpeg command building with progress parsing
//! - An [`AudioCodec`] seam with an FFmpeg-backed implementation
//! - Atomic artifact publishing helpers

pub mod bitrate;
pub mod codec;
pub mod command;
pub mod compress;
pub mod error;
pub mod fs_utils;
pub mod intervals;
pub mod probe;
pub mod progress;
pub mod splice;

pub use bitrate::{exceeds_budget, plan};
pub use codec::{AudioCodec, CodecConfig, FfmpegCodec};
pub use command::{FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use intervals::{complement, is_identity, keep_stats, KeepStats};
pub use probe::AudioInfo;
pub use progress::FfmpegProgress;
