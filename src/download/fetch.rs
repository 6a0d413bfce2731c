//! Download worker: pulls a resolved stream into a per-request directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use super::asset::{DownloadedAsset, REQUEST_DIR_PREFIX};
use super::ytdlp::YtDlp;
use crate::error::DownloadError;
use crate::extractors::{sanitize_file_stem, MediaSource, ResolvedMedia};
use crate::progress::{ProgressReporter, Stage};

/// Fetches resolved media under size and time limits.
#[derive(Debug, Clone)]
pub struct Fetcher {
    http: reqwest::Client,
    ytdlp: YtDlp,
    downloads_dir: PathBuf,
    max_bytes: u64,
    timeout: Duration,
}

impl Fetcher {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        ytdlp: YtDlp,
        downloads_dir: PathBuf,
        max_bytes: u64,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            ytdlp,
            downloads_dir,
            max_bytes,
            timeout,
        }
    }

    #[must_use]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Download `media` into a fresh request directory.
    ///
    /// On failure the directory is removed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream exceeds the size limit, the fetch
    /// times out, or the transfer fails.
    pub async fn fetch(
        &self,
        media: &ResolvedMedia,
        progress: &ProgressReporter,
    ) -> Result<DownloadedAsset, DownloadError> {
        tokio::fs::create_dir_all(&self.downloads_dir).await?;
        let dir = tempfile::Builder::new()
            .prefix(REQUEST_DIR_PREFIX)
            .tempdir_in(&self.downloads_dir)?;

        progress.report(Stage::Downloading, 0);

        // Stems come from post titles and may hold separators or run long
        let stem = sanitize_file_stem(&media.file_stem);
        let file_name = format!("{stem}.{}", media.container);
        let work = async {
            match &media.source {
                MediaSource::Direct { url, headers } => {
                    let path = dir.path().join(&file_name);
                    self.fetch_direct(url, headers, &path, progress).await?;
                    Ok::<_, DownloadError>(path)
                }
                MediaSource::YtDlp {
                    url,
                    format,
                    cookies,
                } => {
                    self.ytdlp
                        .download(
                            url,
                            format,
                            dir.path(),
                            cookies.as_deref(),
                            self.max_bytes,
                            progress,
                        )
                        .await
                }
            }
        };

        let path = tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| DownloadError::Timeout(self.timeout.as_secs()))??;

        let (size, sha256) = hash_file(&path).await?;
        if size > self.max_bytes {
            return Err(DownloadError::FileTooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        if size == 0 {
            return Err(DownloadError::NoMedia);
        }

        progress.report(Stage::Downloading, 100);

        // yt-dlp picks the real container, keep its extension
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| media.container.clone());
        let file_name = format!("{stem}.{ext}");

        info!(
            path = %path.display(),
            size,
            sha256 = %sha256,
            "Downloaded media"
        );

        Ok(DownloadedAsset::new(
            dir,
            path,
            size,
            sha256,
            media.kind,
            file_name,
        ))
    }

    async fn fetch_direct(
        &self,
        url: &str,
        headers: &[(String, String)],
        path: &Path,
        progress: &ProgressReporter,
    ) -> Result<(), DownloadError> {
        debug!(url = %url, "Fetching direct stream");

        let mut request = self.http.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().await?.error_for_status()?;

        let total = response.content_length();
        if let Some(len) = total {
            if len > self.max_bytes {
                return Err(DownloadError::FileTooLarge {
                    size: len,
                    limit: self.max_bytes,
                });
            }
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(DownloadError::FileTooLarge {
                    size: written,
                    limit: self.max_bytes,
                });
            }
            file.write_all(&chunk).await?;
            if let Some(total) = total {
                progress.report_fraction(Stage::Downloading, written, total, 0, 99);
            }
        }

        file.flush().await?;
        Ok(())
    }
}

/// Size and hex SHA-256 of a file.
async fn hash_file(path: &Path) -> Result<(u64, String), DownloadError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut size = 0u64;

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }

    Ok((size, hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let (size, sha) = hash_file(&path).await.unwrap();
        assert_eq!(size, 5);
        assert_eq!(
            sha,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
