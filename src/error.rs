//! User-facing download failures.
//!
//! Every failure on the path from URL to delivered file is folded into
//! [`DownloadError`] so the front end can pick a localized message for it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("unsupported URL: {0}")]
    UnsupportedUrl(String),
    #[error("platform rate limit reached, retry in a few minutes")]
    RateLimited,
    #[error("content is private")]
    PrivateContent,
    #[error("platform requires authentication")]
    LoginRequired,
    #[error("content not found")]
    NotFound,
    #[error("no downloadable media found")]
    NoMedia,
    #[error("file is too large ({size} bytes, limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("download timed out after {0} seconds")]
    Timeout(u64),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("extraction failed: {0}")]
    Extraction(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("service is shutting down")]
    ShuttingDown,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        if e.status().is_some_and(|s| s.as_u16() == 429) {
            return Self::RateLimited;
        }
        if e.status().is_some_and(|s| s.as_u16() == 404) {
            return Self::NotFound;
        }
        Self::Network(e.to_string())
    }
}

impl DownloadError {
    /// Whether retrying the same request later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Timeout(_) | Self::Network(_)
        )
    }

    /// Classify yt-dlp stderr output into a download error.
    #[must_use]
    pub fn from_ytdlp_stderr(stderr: &str) -> Self {
        let lower = stderr.to_lowercase();
        if lower.contains("private video")
            || lower.contains("private profile")
            || lower.contains("this account is private")
        {
            Self::PrivateContent
        } else if lower.contains("login required")
            || lower.contains("sign in to confirm")
            || lower.contains("cookie")
        {
            Self::LoginRequired
        } else if lower.contains("429") || lower.contains("too many requests") {
            Self::RateLimited
        } else if lower.contains("larger than max-filesize") {
            Self::FileTooLarge { size: 0, limit: 0 }
        } else if lower.contains("unsupported url") {
            Self::UnsupportedUrl(last_error_line(stderr))
        } else if lower.contains("404") || lower.contains("video unavailable") {
            Self::NotFound
        } else if lower.contains("no video formats found") || lower.contains("no media") {
            Self::NoMedia
        } else {
            Self::Extraction(last_error_line(stderr))
        }
    }
}

/// Last `ERROR:` line of a tool's stderr, or the last non-empty line.
fn last_error_line(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}
