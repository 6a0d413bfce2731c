use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use regex::Regex;

use super::context::ExtractContext;
use crate::error::DownloadError;
use crate::progress::ProgressReporter;

/// Supported platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Instagram,
    TikTok,
    YouTube,
    Pinterest,
    YandexMusic,
}

impl Platform {
    /// Stable identifier, also used as the cookie file stem.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instagram => "instagram",
            Self::TikTok => "tiktok",
            Self::YouTube => "youtube",
            Self::Pinterest => "pinterest",
            Self::YandexMusic => "yandex_music",
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Instagram => "Instagram",
            Self::TikTok => "TikTok",
            Self::YouTube => "YouTube",
            Self::Pinterest => "Pinterest",
            Self::YandexMusic => "Yandex Music",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A quality the user can pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFormat {
    /// Platform-specific format id passed back on selection.
    pub id: String,
    /// Human-readable label, e.g. `720p`.
    pub quality: String,
    /// Container extension.
    pub ext: String,
}

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatChoice {
    Best,
    Id(String),
}

impl FormatChoice {
    /// Parse the value part of a `quality:` callback.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "best" => Self::Best,
            id => Self::Id(id.to_string()),
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Best => None,
            Self::Id(id) => Some(id),
        }
    }
}

/// Kind of media, which decides how it is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Image,
}

impl MediaKind {
    /// Guess the kind from a container extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "mp3" | "m4a" | "aac" | "ogg" | "opus" | "flac" | "wav" => Self::Audio,
            "jpg" | "jpeg" | "png" | "webp" | "gif" => Self::Image,
            _ => Self::Video,
        }
    }
}

/// Where the media bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// A direct HTTP stream, fetched with the given headers.
    Direct {
        url: String,
        headers: Vec<(String, String)>,
    },
    /// Streams that must be fetched and muxed by yt-dlp.
    YtDlp {
        url: String,
        format: String,
        cookies: Option<PathBuf>,
    },
}

/// Output of an extractor: a stream reference plus what is known about it.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub source: MediaSource,
    /// Container extension, e.g. `mp4`.
    pub container: String,
    pub kind: MediaKind,
    /// Size in bytes, when the platform reports one.
    pub size_estimate: Option<u64>,
    /// File name without extension.
    pub file_stem: String,
    /// HTML caption sent alongside the file.
    pub caption: String,
}

/// Platform-specific resolver from a shared URL to a media stream.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn platform(&self) -> Platform;

    /// URL patterns this extractor matches.
    fn url_patterns(&self) -> &[Regex];

    fn can_handle(&self, url: &str) -> bool {
        self.url_patterns().iter().any(|p| p.is_match(url))
    }

    /// Rewrite a shared URL into the form the platform tooling expects.
    fn normalize_url(&self, url: &str) -> String {
        url.to_string()
    }

    /// Priority for extractor selection (higher = preferred).
    fn priority(&self) -> i32 {
        0
    }

    /// List the qualities available for a URL, best first.
    ///
    /// An empty list means there is nothing to choose from and the best
    /// available stream should be downloaded directly.
    async fn formats(
        &self,
        url: &str,
        ctx: &ExtractContext,
        progress: &ProgressReporter,
    ) -> Result<Vec<MediaFormat>, DownloadError>;

    /// Resolve a URL to a concrete stream for the chosen format.
    async fn resolve(
        &self,
        url: &str,
        choice: &FormatChoice,
        ctx: &ExtractContext,
        progress: &ProgressReporter,
    ) -> Result<ResolvedMedia, DownloadError>;
}
