use async_trait::async_trait;
use regex::Regex;
use url::Url;

use super::caption::html_escape;
use super::context::ExtractContext;
use super::traits::{Extractor, FormatChoice, MediaFormat, Platform, ResolvedMedia};
use super::ytdlp_media::{list_formats, resolve_selection, selector_for};
use crate::error::DownloadError;
use crate::progress::ProgressReporter;

static PATTERNS: std::sync::LazyLock<Vec<Regex>> = std::sync::LazyLock::new(|| {
    vec![
        Regex::new(r"^https?://(www\.|m\.)?youtube\.com/watch\?").unwrap(),
        Regex::new(r"^https?://(www\.|m\.)?youtube\.com/shorts/").unwrap(),
        Regex::new(r"^https?://(www\.|m\.)?youtube\.com/live/").unwrap(),
        Regex::new(r"^https?://(www\.)?youtube\.com/embed/").unwrap(),
        Regex::new(r"^https?://youtu\.be/").unwrap(),
    ]
});

/// Best mp4 video with m4a audio, falling back to any single file.
const BEST_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

pub struct YouTubeExtractor;

impl YouTubeExtractor {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for YouTubeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extractor for YouTubeExtractor {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    fn url_patterns(&self) -> &[Regex] {
        &PATTERNS
    }

    fn priority(&self) -> i32 {
        100
    }

    fn normalize_url(&self, url: &str) -> String {
        let Ok(parsed) = Url::parse(url) else {
            return url.to_string();
        };

        let video_id = match parsed.host_str() {
            Some("youtu.be") => parsed.path_segments().and_then(|mut s| s.next()),
            Some(host) if host.ends_with("youtube.com") => {
                let mut segments = parsed.path_segments().into_iter().flatten();
                match segments.next() {
                    Some("shorts") => segments.next(),
                    _ => None,
                }
            }
            _ => None,
        };

        match video_id.filter(|id| !id.is_empty()) {
            Some(id) => format!("https://www.youtube.com/watch?v={id}"),
            None => url.to_string(),
        }
    }

    async fn formats(
        &self,
        url: &str,
        ctx: &ExtractContext,
        progress: &ProgressReporter,
    ) -> Result<Vec<MediaFormat>, DownloadError> {
        list_formats(&self.normalize_url(url), Platform::YouTube, ctx, progress).await
    }

    async fn resolve(
        &self,
        url: &str,
        choice: &FormatChoice,
        ctx: &ExtractContext,
        progress: &ProgressReporter,
    ) -> Result<ResolvedMedia, DownloadError> {
        let url = self.normalize_url(url);
        let selector = selector_for(choice, BEST_FORMAT);
        let (info, mut media) =
            resolve_selection(&url, &selector, Platform::YouTube, ctx, progress).await?;

        let title = info.title.clone().unwrap_or_else(|| {
            format!("youtube_video_{}", info.id.as_deref().unwrap_or("unknown"))
        });
        media.caption = html_escape(&title);
        media.file_stem = title;
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_handle() {
        let extractor = YouTubeExtractor::new();
        assert!(extractor.can_handle("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(extractor.can_handle("https://m.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(extractor.can_handle("https://youtube.com/shorts/abc123"));
        assert!(extractor.can_handle("https://www.youtube.com/live/abc123"));
        assert!(extractor.can_handle("https://www.youtube.com/embed/abc123"));
        assert!(extractor.can_handle("https://youtu.be/dQw4w9WgXcQ"));
        assert!(!extractor.can_handle("https://www.youtube.com/@channel"));
        assert!(!extractor.can_handle("https://vimeo.com/123"));
    }

    #[test]
    fn test_normalize_url() {
        let extractor = YouTubeExtractor::new();
        assert_eq!(
            extractor.normalize_url("https://youtu.be/dQw4w9WgXcQ?t=10"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            extractor.normalize_url("https://www.youtube.com/shorts/abc123"),
            "https://www.youtube.com/watch?v=abc123"
        );
        assert_eq!(
            extractor.normalize_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }
}
