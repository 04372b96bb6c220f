//! Library listing and name resolution.
//!
//! Artifacts are addressed by their path relative to the library root, with
//! `/` separators, e.g. `My Show/2025-06-10 - Episode.mp3`.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use podtrim_media::fs_utils::file_exists;
use podtrim_models::{ArtifactKind, ArtifactPaths, ArtifactStatus};

use crate::error::{PipelineError, PipelineResult};

/// Maximum directory depth scanned below the root.
const MAX_SCAN_DEPTH: usize = 4;

#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
}

impl Catalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative artifact name to a path under the root.
    ///
    /// Absolute paths, `..` and empty names are rejected.
    pub fn resolve(&self, name: &str) -> PipelineResult<PathBuf> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PipelineError::invalid_name("empty file name"));
        }
        if name.contains('\0') || name.contains('\\') {
            return Err(PipelineError::invalid_name(format!("'{name}' contains invalid characters")));
        }
        let relative = Path::new(name);
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(PipelineError::invalid_name(format!(
                        "'{name}' must be a path inside the library"
                    )))
                }
            }
        }
        if resolved == self.root {
            return Err(PipelineError::invalid_name(format!("'{name}' does not name a file")));
        }
        Ok(resolved)
    }

    /// Inverse of [`Catalog::resolve`].
    pub fn relative_name(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Resolve `name` and require it to be an existing audio artifact.
    pub async fn resolve_audio(&self, name: &str) -> PipelineResult<PathBuf> {
        let path = self.resolve(name)?;
        match file_kind(&path) {
            Some(kind) if kind.is_audio() => {}
            _ => {
                return Err(PipelineError::invalid_name(format!("'{name}' is not an .mp3 file")));
            }
        }
        if !file_exists(&path).await {
            return Err(PipelineError::not_found(path));
        }
        Ok(path)
    }

    /// Resolve `name` to the source recording it belongs to.
    ///
    /// Accepts the source itself or any artifact derived from it.
    pub fn resolve_source(&self, name: &str) -> PipelineResult<PathBuf> {
        let path = self.resolve(name)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut source_name = ArtifactKind::derived_from(&file_name)
            .ok_or_else(|| PipelineError::invalid_name(format!("'{name}' is not a known artifact")))?;
        // A compressed no-ads file derives from the no-ads file, which derives from the source
        while ArtifactKind::classify(&source_name) != Some(ArtifactKind::Source) {
            source_name = ArtifactKind::derived_from(&source_name)
                .filter(|next| *next != source_name)
                .ok_or_else(|| PipelineError::invalid_name(format!("'{name}' is not a known artifact")))?;
        }
        Ok(path.with_file_name(source_name))
    }

    /// Every recognised artifact under the root, sorted and deduplicated.
    ///
    /// A missing root yields an empty list.
    pub async fn list(&self) -> PipelineResult<Vec<String>> {
        let mut names = BTreeSet::new();
        let root_is_dir = tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !root_is_dir {
            return Ok(Vec::new());
        }

        let mut pending = vec![(self.root.clone(), 0usize)];
        while let Some((dir, depth)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    if depth < MAX_SCAN_DEPTH {
                        pending.push((path, depth + 1));
                    }
                } else if file_type.is_file() && file_kind(&path).is_some() {
                    names.insert(self.relative_name(&path));
                }
            }
        }
        Ok(names.into_iter().collect())
    }

    /// Which artifacts exist for the source named `name`.
    pub async fn status(&self, name: &str, in_flight: bool) -> PipelineResult<ArtifactStatus> {
        let source = self.resolve_source(name)?;
        let paths = ArtifactPaths::for_source(&source);
        let mut status = ArtifactStatus {
            source: self.relative_name(&source),
            source_exists: file_exists(&paths.source).await,
            transcript: file_exists(&paths.transcript).await,
            analysis: any_exists(&paths.analysis_candidates()).await,
            no_ads: file_exists(&paths.no_ads).await,
            compressed: any_exists(&paths.compressed_candidates()).await,
            in_flight,
            next_stage: None,
            checked_at: Utc::now(),
        };
        status.next_stage = status.pending_stage();
        Ok(status)
    }
}

/// Classify `path` by its file name.
pub fn file_kind(path: &Path) -> Option<ArtifactKind> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(ArtifactKind::classify)
}

/// First existing path among `candidates`.
pub async fn first_existing<'a>(candidates: &[&'a Path]) -> Option<&'a Path> {
    for candidate in candidates {
        if file_exists(candidate).await {
            return Some(*candidate);
        }
    }
    None
}

async fn any_exists(candidates: &[&Path]) -> bool {
    first_existing(candidates).await.is_some()
}
