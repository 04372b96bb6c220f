//! Filesystem helpers for publishing artifacts.
//!
//! Artifacts are written to a sibling `*.partial` path and renamed into
//! place once complete, so an existence check never observes a half-written
//! file.

use std::path::Path;
use tokio::fs;

use podtrim_models::artifact::partial_path;

use crate::error::{MediaError, MediaResult};

/// Rename a finished `src` over `dst`.
///
/// `src` must live in `dst`'s directory so the rename is atomic.
pub async fn rename_into_place(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    ensure_parent(dst).await?;
    fs::rename(src, dst).await?;
    tracing::debug!("Published {}", dst.display());
    Ok(())
}

/// Write `contents` to `dst` atomically.
pub async fn write_atomic(dst: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> MediaResult<()> {
    let dst = dst.as_ref();
    ensure_parent(dst).await?;

    let tmp = partial_path(dst);
    if let Err(e) = fs::write(&tmp, contents).await {
        remove_quietly(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = rename_into_place(&tmp, dst).await {
        remove_quietly(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Remove a file if present, logging rather than failing.
pub async fn remove_quietly(path: impl AsRef<Path>) {
    let path = path.as_ref();
    match fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Whether `path` exists as a regular file.
pub async fn file_exists(path: impl AsRef<Path>) -> bool {
    fs::metadata(path.as_ref())
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Size of a file in bytes.
pub async fn file_size(path: impl AsRef<Path>) -> MediaResult<u64> {
    let path = path.as_ref();
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(MediaError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !fs::try_exists(parent).await.unwrap_or(false) {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}
