//! Helpers shared by integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use zenload::config::Config;
use zenload::dispatcher::Dispatcher;
use zenload::download::{Fetcher, YtDlp};
use zenload::error::DownloadError;
use zenload::extractors::{
    ExtractContext, Extractor, ExtractorRegistry, FormatChoice, MediaFormat, MediaKind,
    MediaSource, Platform, ResolvedMedia,
};
use zenload::progress::{ProgressReporter, Stage};

/// URLs the fake extractor claims.
pub const FAKE_URL: &str = "https://fake.test/v/1";

static PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| vec![Regex::new(r"^https://fake\.test/").unwrap()]);

/// Extractor that resolves every URL to a fixed direct stream.
pub struct FakeExtractor {
    pub media_url: String,
    pub size_estimate: Option<u64>,
}

#[async_trait]
impl Extractor for FakeExtractor {
    fn platform(&self) -> Platform {
        Platform::TikTok
    }

    fn url_patterns(&self) -> &[Regex] {
        &PATTERNS
    }

    async fn formats(
        &self,
        _url: &str,
        _ctx: &ExtractContext,
        _progress: &ProgressReporter,
    ) -> Result<Vec<MediaFormat>, DownloadError> {
        Ok(vec![MediaFormat {
            id: "hd".to_string(),
            quality: "720p".to_string(),
            ext: "mp4".to_string(),
        }])
    }

    async fn resolve(
        &self,
        _url: &str,
        choice: &FormatChoice,
        _ctx: &ExtractContext,
        progress: &ProgressReporter,
    ) -> Result<ResolvedMedia, DownloadError> {
        progress.report(Stage::GettingInfo, 100);
        Ok(ResolvedMedia {
            source: MediaSource::Direct {
                url: self.media_url.clone(),
                headers: Vec::new(),
            },
            container: "mp4".to_string(),
            kind: MediaKind::Video,
            size_estimate: self.size_estimate,
            file_stem: format!("fake_{}", choice.id().unwrap_or("best")),
            caption: "<b>fake</b>".to_string(),
        })
    }
}

/// Dispatcher with only the fake extractor, downloading into `downloads`
/// with a 1 MiB limit.
pub fn fake_dispatcher(downloads: &Path, media_url: String, size_estimate: Option<u64>) -> Dispatcher {
    let mut config = Config::for_testing();
    config.downloads_dir = downloads.to_path_buf();
    config.cookies_dir = downloads.join("cookies");
    config.max_upload_bytes = 1024 * 1024;

    let ctx = ExtractContext::from_config(&config).unwrap();
    let fetcher = Fetcher::new(
        reqwest::Client::new(),
        YtDlp::new("yt-dlp", Duration::from_secs(10)),
        config.downloads_dir.clone(),
        config.max_upload_bytes,
        Duration::from_secs(10),
    );

    let mut registry = ExtractorRegistry::new();
    registry.register(Box::new(FakeExtractor {
        media_url,
        size_estimate,
    }));
    Dispatcher::new(registry, ctx, fetcher, 2, 1)
}

/// Number of per-request directories left under `downloads`.
pub fn request_dirs(downloads: &Path) -> usize {
    std::fs::read_dir(downloads)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.file_name().to_string_lossy().starts_with("req-"))
                .count()
        })
        .unwrap_or(0)
}
