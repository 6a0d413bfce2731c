use async_trait::async_trait;
use rand::Rng;
use regex::Regex;

use super::caption::html_escape;
use super::context::ExtractContext;
use super::traits::{Extractor, FormatChoice, MediaFormat, Platform, ResolvedMedia};
use super::ytdlp_media::{list_formats, resolve_selection, selector_for};
use crate::download::MediaInfo;
use crate::error::DownloadError;
use crate::progress::ProgressReporter;

static PATTERNS: std::sync::LazyLock<Vec<Regex>> = std::sync::LazyLock::new(|| {
    vec![
        Regex::new(r"^https?://(www\.)?tiktok\.com/").unwrap(),
        Regex::new(r"^https?://vm\.tiktok\.com/").unwrap(),
        Regex::new(r"^https?://m\.tiktok\.com/").unwrap(),
    ]
});

static VIDEO_ID: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"tiktok\.com/@[^/]+/video/(\d+)").unwrap());

static SHORT_CODE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"tiktok\.com/t/([^/?#]+)").unwrap());

pub struct TikTokExtractor;

impl TikTokExtractor {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for TikTokExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Title for a video: its title, else `{uploader}_video_{id}`, else a
/// generated name.
fn video_title(info: &MediaInfo) -> String {
    if let Some(title) = info.title.as_deref().filter(|t| !t.trim().is_empty()) {
        return title.to_string();
    }

    let id = info.id.as_deref().filter(|id| !id.is_empty());
    match (info.uploader.as_deref().filter(|u| !u.is_empty()), id) {
        (Some(uploader), Some(id)) => format!("{uploader}_video_{id}"),
        (_, Some(id)) => format!("tiktok_video_{id}"),
        _ => format!("tiktok_video_{:08x}", rand::thread_rng().gen::<u32>()),
    }
}

#[async_trait]
impl Extractor for TikTokExtractor {
    fn platform(&self) -> Platform {
        Platform::TikTok
    }

    fn url_patterns(&self) -> &[Regex] {
        &PATTERNS
    }

    fn priority(&self) -> i32 {
        100
    }

    fn normalize_url(&self, url: &str) -> String {
        // Short links are resolved by yt-dlp itself
        if url.contains("vm.tiktok.com") {
            return url.to_string();
        }
        if let Some(caps) = VIDEO_ID.captures(url) {
            return format!("https://www.tiktok.com/video/{}", &caps[1]);
        }
        if let Some(caps) = SHORT_CODE.captures(url) {
            return format!("https://www.tiktok.com/t/{}", &caps[1]);
        }
        url.to_string()
    }

    async fn formats(
        &self,
        url: &str,
        ctx: &ExtractContext,
        progress: &ProgressReporter,
    ) -> Result<Vec<MediaFormat>, DownloadError> {
        list_formats(&self.normalize_url(url), Platform::TikTok, ctx, progress).await
    }

    async fn resolve(
        &self,
        url: &str,
        choice: &FormatChoice,
        ctx: &ExtractContext,
        progress: &ProgressReporter,
    ) -> Result<ResolvedMedia, DownloadError> {
        let url = self.normalize_url(url);
        let selector = selector_for(choice, "best");
        let (info, mut media) =
            resolve_selection(&url, &selector, Platform::TikTok, ctx, progress).await?;

        let title = video_title(&info);
        media.caption = html_escape(&title);
        media.file_stem = title;
        Ok(media)
    }
}
