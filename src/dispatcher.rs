//! Request sequencing: classify, resolve, download, deliver, clean up.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::download::{DownloadedAsset, Fetcher, PlatformLimiter, PlatformPermit};
use crate::error::DownloadError;
use crate::extractors::{
    ExtractContext, Extractor, ExtractorRegistry, FormatChoice, MediaFormat, Platform,
};
use crate::progress::{ProgressReporter, Stage};

/// One user request to download a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub user_id: i64,
    pub chat_id: i64,
    pub submitted_at: DateTime<Utc>,
}

impl Request {
    #[must_use]
    pub fn new(url: impl Into<String>, user_id: i64, chat_id: i64) -> Self {
        Self {
            url: url.into(),
            user_id,
            chat_id,
            submitted_at: Utc::now(),
        }
    }
}

/// Sends a downloaded asset back to the requester.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(
        &self,
        asset: &DownloadedAsset,
        caption: &str,
        progress: &ProgressReporter,
    ) -> Result<()>;
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error("delivery failed: {0:#}")]
    Delivery(anyhow::Error),
}

/// Routes requests to extractors and runs them under concurrency limits.
pub struct Dispatcher {
    registry: ExtractorRegistry,
    ctx: ExtractContext,
    fetcher: Fetcher,
    platforms: PlatformLimiter,
    slots: Arc<Semaphore>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        registry: ExtractorRegistry,
        ctx: ExtractContext,
        fetcher: Fetcher,
        max_concurrent: usize,
        per_platform: usize,
    ) -> Self {
        Self {
            registry,
            ctx,
            fetcher,
            platforms: PlatformLimiter::new(per_platform),
            slots: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Build the dispatcher and everything it owns from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let ctx = ExtractContext::from_config(config)?;
        let fetcher = Fetcher::new(
            ctx.http.clone(),
            ctx.ytdlp.clone(),
            config.downloads_dir.clone(),
            config.max_upload_bytes,
            config.download_timeout,
        );
        Ok(Self::new(
            ExtractorRegistry::from_config(config),
            ctx,
            fetcher,
            config.max_concurrent_downloads,
            config.per_platform_concurrency,
        ))
    }

    /// Extractor for a URL, highest priority first.
    #[must_use]
    pub fn classify(&self, url: &str) -> Option<&dyn Extractor> {
        self.registry.find(url)
    }

    /// List the qualities available for a request.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is unsupported or extraction fails.
    pub async fn formats(
        &self,
        request: &Request,
        progress: &ProgressReporter,
    ) -> Result<Vec<MediaFormat>, DownloadError> {
        let extractor = self
            .classify(&request.url)
            .ok_or_else(|| DownloadError::UnsupportedUrl(request.url.clone()))?;
        progress.report(Stage::GettingInfo, 0);
        let formats = extractor.formats(&request.url, &self.ctx, progress).await?;
        debug!(
            url = %request.url,
            platform = %extractor.platform(),
            count = formats.len(),
            "Listed formats"
        );
        Ok(formats)
    }

    /// Resolve, download and deliver a request.
    ///
    /// The downloaded file is deleted before this returns, whatever the
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Download`] for failures up to and including
    /// the download, and [`ProcessError::Delivery`] if sending fails.
    pub async fn process(
        &self,
        request: &Request,
        choice: &FormatChoice,
        progress: &ProgressReporter,
        delivery: &dyn Delivery,
    ) -> Result<(), ProcessError> {
        let started = Instant::now();
        let extractor = self
            .classify(&request.url)
            .ok_or_else(|| DownloadError::UnsupportedUrl(request.url.clone()))?;
        let platform = extractor.platform();

        info!(
            url = %request.url,
            platform = %platform,
            user_id = request.user_id,
            chat_id = request.chat_id,
            choice = ?choice,
            "Processing request"
        );

        let _slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| DownloadError::ShuttingDown)?;

        // The platform slot is released once the download is done
        let (asset, caption) = {
            let _platform_permit = self.platform_slot(platform).await?;

            progress.report(Stage::GettingInfo, 0);
            let media = extractor
                .resolve(&request.url, choice, &self.ctx, progress)
                .await?;

            if let Some(size) = media.size_estimate {
                if size > self.fetcher.max_bytes() {
                    return Err(DownloadError::FileTooLarge {
                        size,
                        limit: self.fetcher.max_bytes(),
                    }
                    .into());
                }
            }

            let asset = self.fetcher.fetch(&media, progress).await?;
            (asset, media.caption)
        };

        progress.report(Stage::Sending, 0);
        let delivered = delivery.deliver(&asset, &caption, progress).await;
        if delivered.is_ok() {
            progress.report(Stage::Sending, 100);
        }

        let size = asset.size();
        if let Err(e) = asset.close() {
            warn!(url = %request.url, "Failed to remove downloaded file: {e}");
        }

        delivered.map_err(ProcessError::Delivery)?;

        info!(
            url = %request.url,
            platform = %platform,
            size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request delivered"
        );
        Ok(())
    }

    async fn platform_slot(&self, platform: Platform) -> Result<PlatformPermit, DownloadError> {
        if let Some(permit) = self.platforms.try_acquire(platform).await {
            return Ok(permit);
        }
        debug!(platform = %platform, "Waiting for a free platform slot");
        let permit = self.platforms.acquire(platform).await?;
        debug!(platform = %permit.platform(), "Platform slot acquired");
        Ok(permit)
    }

    /// Stop handing out download slots; queued requests fail.
    pub async fn shutdown(&self) {
        self.slots.close();
        self.platforms.close().await;
    }
}
