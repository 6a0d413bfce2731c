use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LOCATION};
use reqwest::redirect::Policy;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use super::caption::{format_count, html_escape};
use super::context::ExtractContext;
use super::traits::{Extractor, FormatChoice, MediaFormat, Platform, ResolvedMedia};
use super::ytdlp_media::{list_formats, resolve_selection, selector_for};
use crate::constants::{BROWSER_USER_AGENT, INSTAGRAM_APP_ID};
use crate::error::DownloadError;
use crate::progress::{ProgressReporter, Stage};

static PATTERNS: std::sync::LazyLock<Vec<Regex>> = std::sync::LazyLock::new(|| {
    vec![
        Regex::new(r"^https?://(www\.)?instagram\.com/(p|reel|reels|tv)/[A-Za-z0-9_-]+").unwrap(),
        Regex::new(r"^https?://(www\.)?instagram\.com/stories/[^/]+/[0-9]+").unwrap(),
        // Share links redirect to the real post
        Regex::new(r"^https?://(www\.)?instagram\.com/share/").unwrap(),
        Regex::new(r"^https?://instagr\.am/(p|reel)/[A-Za-z0-9_-]+").unwrap(),
    ]
});

const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(2);
const BACKOFF_BASE: Duration = Duration::from_secs(5);
const MAX_RETRIES: u32 = 3;
const MAX_REDIRECTS: usize = 10;

/// Instagram posts, reels, stories and share links.
///
/// Requests to Instagram are spaced out and retried with exponential backoff
/// on HTTP 429.
pub struct InstagramExtractor {
    min_interval: Duration,
    backoff_base: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl InstagramExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::with_timing(MIN_REQUEST_INTERVAL, BACKOFF_BASE)
    }

    /// Custom spacing between requests and first backoff delay.
    #[must_use]
    pub fn with_timing(min_interval: Duration, backoff_base: Duration) -> Self {
        Self {
            min_interval,
            backoff_base,
            last_request: Mutex::new(None),
        }
    }

    /// Wait until the minimum interval since the previous request has passed.
    async fn wait_turn(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Run a paced request, backing off on rate limits.
    async fn with_backoff<T, F, Fut>(&self, mut op: F) -> Result<T, DownloadError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DownloadError>>,
    {
        let mut retries = 0;
        loop {
            self.wait_turn().await;
            match op().await {
                Err(DownloadError::RateLimited) if retries < MAX_RETRIES => {
                    let delay = self.backoff_base * 2u32.pow(retries);
                    retries += 1;
                    warn!(
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        "Instagram rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    /// Resolve an `instagram.com/share/...` link to the post it points at.
    ///
    /// Redirects are followed by hand so relative `Location` headers can be
    /// resolved against the current URL. Other URLs are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if Instagram keeps rate limiting, the chain ends in a
    /// non-200 response, or it is longer than the redirect limit.
    pub async fn resolve_share_url(&self, url: &str) -> Result<String, DownloadError> {
        if !url.contains("/share/") {
            return Ok(url.to_string());
        }

        info!(url = %url, "Resolving Instagram share URL");

        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(instagram_headers())
            .build()
            .map_err(|e| DownloadError::Network(e.to_string()))?;

        let mut current =
            Url::parse(url).map_err(|_| DownloadError::UnsupportedUrl(url.to_string()))?;

        for _ in 0..MAX_REDIRECTS {
            let response = {
                let client = &client;
                let target = &current;
                self.with_backoff(move || fetch_hop(client, target)).await?
            };

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        DownloadError::Extraction("redirect without a Location header".to_string())
                    })?;
                let next = current
                    .join(location)
                    .map_err(|e| DownloadError::Extraction(format!("bad redirect target: {e}")))?;
                debug!(from = %current, to = %next, "Following Instagram redirect");
                current = next;
                continue;
            }

            if status.as_u16() == 404 {
                return Err(DownloadError::NotFound);
            }
            if !status.is_success() {
                return Err(DownloadError::Extraction(format!(
                    "share link returned HTTP {status}"
                )));
            }

            current.set_query(None);
            current.set_fragment(None);
            let resolved = current.as_str().trim_end_matches('/').to_string();
            info!(url = %url, resolved = %resolved, "Resolved Instagram share URL");
            return Ok(resolved);
        }

        Err(DownloadError::Extraction(
            "too many redirects while resolving share link".to_string(),
        ))
    }

    async fn canonical_url(
        &self,
        url: &str,
        progress: &ProgressReporter,
    ) -> Result<String, DownloadError> {
        progress.report(Stage::GettingInfo, 0);
        let resolved = self.resolve_share_url(url).await?;
        Ok(self.normalize_url(&resolved))
    }
}

impl Default for InstagramExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn instagram_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert("X-IG-App-ID", HeaderValue::from_static(INSTAGRAM_APP_ID));
    headers
}

async fn fetch_hop(client: &reqwest::Client, url: &Url) -> Result<reqwest::Response, DownloadError> {
    let response = client.get(url.clone()).send().await?;
    if response.status().as_u16() == 429 {
        return Err(DownloadError::RateLimited);
    }
    Ok(response)
}

/// Caption: counts line followed by a link to the author.
fn build_caption(
    url: &str,
    uploader: Option<&str>,
    views: Option<u64>,
    likes: Option<u64>,
) -> String {
    let username = uploader
        .unwrap_or_default()
        .replace("https://www.instagram.com/", "");
    let username = html_escape(username.trim());
    let likes = format_count(likes);

    match views.filter(|v| *v > 0) {
        Some(views) => format!(
            "Instagram | {} | {likes}\nby <a href=\"{url}\">{username}</a>",
            format_count(Some(views))
        ),
        None => format!("Instagram | {likes}\nby <a href=\"{url}\">{username}</a>"),
    }
}

#[async_trait]
impl Extractor for InstagramExtractor {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn url_patterns(&self) -> &[Regex] {
        &PATTERNS
    }

    fn priority(&self) -> i32 {
        100
    }

    fn normalize_url(&self, url: &str) -> String {
        let normalized = url.replace("://instagr.am/", "://www.instagram.com/");
        let without_query = normalized
            .split(['?', '#'])
            .next()
            .unwrap_or(&normalized);
        without_query.trim_end_matches('/').to_string()
    }

    async fn formats(
        &self,
        url: &str,
        ctx: &ExtractContext,
        progress: &ProgressReporter,
    ) -> Result<Vec<MediaFormat>, DownloadError> {
        let url = self.canonical_url(url, progress).await?;
        let url = url.as_str();
        self.with_backoff(move || list_formats(url, Platform::Instagram, ctx, progress))
            .await
    }

    async fn resolve(
        &self,
        url: &str,
        choice: &FormatChoice,
        ctx: &ExtractContext,
        progress: &ProgressReporter,
    ) -> Result<ResolvedMedia, DownloadError> {
        let url = self.canonical_url(url, progress).await?;
        let selector = selector_for(choice, "best");
        let (url, selector) = (url.as_str(), selector.as_str());

        let (info, mut media) = self
            .with_backoff(move || {
                resolve_selection(url, selector, Platform::Instagram, ctx, progress)
            })
            .await?;

        media.caption = build_caption(
            url,
            info.uploader.as_deref(),
            info.view_count,
            info.like_count,
        );
        if let Some(id) = &info.id {
            media.file_stem = format!("instagram_{id}");
        }
        Ok(media)
    }
}
