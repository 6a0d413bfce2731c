use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::extractors::MediaKind;

/// Prefix of per-request directories under the downloads directory.
pub(crate) const REQUEST_DIR_PREFIX: &str = "req-";

/// A downloaded file in its own per-request directory.
///
/// Dropping the asset deletes the directory and everything in it.
#[derive(Debug)]
pub struct DownloadedAsset {
    dir: TempDir,
    path: PathBuf,
    size: u64,
    sha256: String,
    kind: MediaKind,
    file_name: String,
}

impl DownloadedAsset {
    pub(crate) fn new(
        dir: TempDir,
        path: PathBuf,
        size: u64,
        sha256: String,
        kind: MediaKind,
        file_name: String,
    ) -> Self {
        Self {
            dir,
            path,
            size,
            sha256,
            kind,
            file_name,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the file; removed with the asset.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Hex-encoded SHA-256 of the file contents.
    #[must_use]
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// File name to present on upload.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Delete the file now, reporting failures instead of ignoring them.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn close(self) -> std::io::Result<()> {
        let dir = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!(dir = %dir.display(), "Removed downloaded asset");
        Ok(())
    }
}

/// Remove request directories left behind by a previous run.
///
/// # Errors
///
/// Returns an error if the downloads directory cannot be read.
pub async fn sweep_stale_downloads(downloads_dir: &Path) -> std::io::Result<usize> {
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(downloads_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(REQUEST_DIR_PREFIX) {
            continue;
        }
        match tokio::fs::remove_dir_all(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.path().display(), "Failed to remove stale download: {e}"),
        }
    }

    if removed > 0 {
        info!(count = removed, "Removed stale downloads from a previous run");
    }
    Ok(removed)
}
