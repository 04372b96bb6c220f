//! Artifact naming.
//!
//! Every stage output is named by a suffix rule applied to the audio file it
//! was derived from. Matching is case-sensitive.
//!
//! | Artifact   | Name                                                 |
//! |------------|------------------------------------------------------|
//! | Source     | `<name>.mp3`                                         |
//! | Transcript | `<name>.mp3.json`                                    |
//! | Analysis   | `<name>.mp3.analysis.json` or `<name>.mp3.json.analysis.json` |
//! | No-ads     | `<name>_no_ads.mp3`                                  |
//! | Compressed | `<name>.compressed.mp3` or `compressed_<name>.mp3`   |

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const AUDIO_EXTENSION: &str = ".mp3";
pub const TRANSCRIPT_SUFFIX: &str = ".json";
pub const ANALYSIS_SUFFIX: &str = ".analysis.json";
pub const NO_ADS_SUFFIX: &str = "_no_ads.mp3";
pub const COMPRESSED_SUFFIX: &str = ".compressed.mp3";
pub const LEGACY_COMPRESSED_PREFIX: &str = "compressed_";
/// In-progress writes carry this suffix until renamed into place.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Kind of file found in the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Source,
    Transcript,
    Analysis,
    NoAds,
    Compressed,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Source => "source",
            ArtifactKind::Transcript => "transcript",
            ArtifactKind::Analysis => "analysis",
            ArtifactKind::NoAds => "no_ads",
            ArtifactKind::Compressed => "compressed",
        }
    }

    /// Classify a bare file name. Unknown and partially written files yield `None`.
    pub fn classify(file_name: &str) -> Option<Self> {
        if file_name.ends_with(PARTIAL_SUFFIX) {
            return None;
        }
        if file_name.ends_with(ANALYSIS_SUFFIX) {
            return Some(ArtifactKind::Analysis);
        }
        if file_name.ends_with(".mp3.json") {
            return Some(ArtifactKind::Transcript);
        }
        if !file_name.ends_with(AUDIO_EXTENSION) {
            return None;
        }
        if file_name.ends_with(COMPRESSED_SUFFIX) || file_name.starts_with(LEGACY_COMPRESSED_PREFIX) {
            return Some(ArtifactKind::Compressed);
        }
        if file_name.ends_with(NO_ADS_SUFFIX) {
            return Some(ArtifactKind::NoAds);
        }
        Some(ArtifactKind::Source)
    }

    /// Whether this kind is playable audio.
    pub fn is_audio(&self) -> bool {
        matches!(
            self,
            ArtifactKind::Source | ArtifactKind::NoAds | ArtifactKind::Compressed
        )
    }

    /// Name of the audio file this artifact was derived from.
    ///
    /// Transcripts, analyses and no-ads files map back to their source; a
    /// compressed file maps to the audio it was compressed from.
    pub fn derived_from(file_name: &str) -> Option<String> {
        match Self::classify(file_name)? {
            ArtifactKind::Source => Some(file_name.to_string()),
            ArtifactKind::Transcript => file_name.strip_suffix(TRANSCRIPT_SUFFIX).map(str::to_string),
            ArtifactKind::Analysis => {
                let base = file_name.strip_suffix(ANALYSIS_SUFFIX)?;
                let base = if base.ends_with(".mp3.json") {
                    base.strip_suffix(TRANSCRIPT_SUFFIX)?
                } else {
                    base
                };
                Some(base.to_string())
            }
            ArtifactKind::NoAds => file_name
                .strip_suffix(NO_ADS_SUFFIX)
                .map(|stem| format!("{stem}{AUDIO_EXTENSION}")),
            ArtifactKind::Compressed => {
                if let Some(stem) = file_name.strip_suffix(COMPRESSED_SUFFIX) {
                    Some(format!("{stem}{AUDIO_EXTENSION}"))
                } else {
                    file_name
                        .strip_prefix(LEGACY_COMPRESSED_PREFIX)
                        .map(str::to_string)
                }
            }
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append a suffix to the full file name, keeping existing extensions.
pub fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn audio_stem(path: &Path) -> String {
    let name = file_name_string(path);
    match name.strip_suffix(AUDIO_EXTENSION) {
        Some(stem) => stem.to_string(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(name),
    }
}

/// `<name>.mp3` -> `<name>.mp3.json`
pub fn transcript_path(audio: &Path) -> PathBuf {
    append_suffix(audio, TRANSCRIPT_SUFFIX)
}

/// `<name>.mp3` -> `<name>.mp3.analysis.json`
pub fn analysis_path(audio: &Path) -> PathBuf {
    append_suffix(audio, ANALYSIS_SUFFIX)
}

/// `<name>.mp3` -> `<name>.mp3.json.analysis.json`
pub fn transcript_analysis_path(audio: &Path) -> PathBuf {
    append_suffix(&transcript_path(audio), ANALYSIS_SUFFIX)
}

/// `<name>.mp3` -> `<name>_no_ads.mp3`
pub fn no_ads_path(audio: &Path) -> PathBuf {
    audio.with_file_name(format!("{}{NO_ADS_SUFFIX}", audio_stem(audio)))
}

/// `<name>.mp3` -> `<name>.compressed.mp3`
pub fn compressed_path(audio: &Path) -> PathBuf {
    audio.with_file_name(format!("{}{COMPRESSED_SUFFIX}", audio_stem(audio)))
}

/// `<name>.mp3` -> `compressed_<name>.mp3`
pub fn legacy_compressed_path(audio: &Path) -> PathBuf {
    audio.with_file_name(format!("{LEGACY_COMPRESSED_PREFIX}{}", file_name_string(audio)))
}

/// Sibling path used while an artifact is being written.
pub fn partial_path(target: &Path) -> PathBuf {
    append_suffix(target, PARTIAL_SUFFIX)
}

/// All artifact paths derived from one source recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub source: PathBuf,
    pub transcript: PathBuf,
    pub analysis: PathBuf,
    pub transcript_analysis: PathBuf,
    pub no_ads: PathBuf,
    pub compressed: PathBuf,
    pub legacy_compressed: PathBuf,
}

impl ArtifactPaths {
    pub fn for_source(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        Self {
            transcript: transcript_path(&source),
            analysis: analysis_path(&source),
            transcript_analysis: transcript_analysis_path(&source),
            no_ads: no_ads_path(&source),
            compressed: compressed_path(&source),
            legacy_compressed: legacy_compressed_path(&source),
            source,
        }
    }

    /// Analysis locations in lookup order. The first is the one written.
    pub fn analysis_candidates(&self) -> [&Path; 2] {
        [&self.analysis, &self.transcript_analysis]
    }

    /// Compressed locations in lookup order. The first is the one written.
    pub fn compressed_candidates(&self) -> [&Path; 2] {
        [&self.compressed, &self.legacy_compressed]
    }
}
