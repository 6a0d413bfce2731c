use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::caption::{format_count, html_escape};
use super::context::ExtractContext;
use super::traits::{Extractor, FormatChoice, MediaFormat, Platform, ResolvedMedia};
use super::ytdlp_media::{list_formats, resolve_selection};
use crate::download::MediaInfo;
use crate::error::DownloadError;
use crate::progress::ProgressReporter;

static PATTERNS: std::sync::LazyLock<Vec<Regex>> = std::sync::LazyLock::new(|| {
    vec![
        Regex::new(r"^https?://([a-z]{2,3}\.|www\.)?pinterest\.[a-z.]+/pin/").unwrap(),
        Regex::new(r"^https?://pin\.it/[A-Za-z0-9]+").unwrap(),
    ]
});

pub struct PinterestExtractor;

impl PinterestExtractor {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for PinterestExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// `Pinterest | 1.2K views | by someone | \ntitle`, skipping empty parts.
fn build_caption(info: &MediaInfo) -> String {
    let mut parts = vec!["Pinterest".to_string()];

    let views = format_count(info.view_count);
    if views != "0" {
        parts.push(format!("{views} views"));
    }
    if let Some(uploader) = info.uploader.as_deref().filter(|u| !u.is_empty()) {
        parts.push(format!("by {}", html_escape(uploader)));
    }
    if let Some(title) = info.title.as_deref().filter(|t| !t.is_empty()) {
        parts.push(format!("\n{}", html_escape(title)));
    }

    parts.join(" | ")
}

#[async_trait]
impl Extractor for PinterestExtractor {
    fn platform(&self) -> Platform {
        Platform::Pinterest
    }

    fn url_patterns(&self) -> &[Regex] {
        &PATTERNS
    }

    fn priority(&self) -> i32 {
        100
    }

    async fn formats(
        &self,
        url: &str,
        ctx: &ExtractContext,
        progress: &ProgressReporter,
    ) -> Result<Vec<MediaFormat>, DownloadError> {
        let formats = list_formats(url, Platform::Pinterest, ctx, progress).await?;
        if formats.is_empty() {
            debug!(url = %url, "Pinterest offered no video formats");
            return Err(DownloadError::NoMedia);
        }
        Ok(formats)
    }

    async fn resolve(
        &self,
        url: &str,
        choice: &FormatChoice,
        ctx: &ExtractContext,
        progress: &ProgressReporter,
    ) -> Result<ResolvedMedia, DownloadError> {
        let selector = choice.id().unwrap_or("best");
        let (info, mut media) =
            resolve_selection(url, selector, Platform::Pinterest, ctx, progress).await?;

        media.caption = build_caption(&info);
        if let Some(id) = &info.id {
            media.file_stem = format!("pinterest_{id}");
        }
        Ok(media)
    }
}
