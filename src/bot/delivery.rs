//! Uploads downloaded assets to the requesting chat.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::dispatcher::Delivery;
use crate::download::DownloadedAsset;
use crate::extractors::MediaKind;
use crate::progress::ProgressReporter;
use crate::telegram::{TelegramClient, TelegramError, UploadKind};

/// Largest image `sendPhoto` accepts; bigger images go out as documents.
const PHOTO_LIMIT_BYTES: u64 = 10 * 1024 * 1024;

/// Upload method for an asset.
#[must_use]
pub fn upload_kind(kind: MediaKind, size: u64) -> UploadKind {
    match kind {
        MediaKind::Video => UploadKind::Video,
        MediaKind::Audio => UploadKind::Audio,
        MediaKind::Image if size <= PHOTO_LIMIT_BYTES => UploadKind::Photo,
        MediaKind::Image => UploadKind::Document,
    }
}

/// Sends assets to one chat.
pub struct TelegramDelivery {
    api: TelegramClient,
    chat_id: i64,
}

impl TelegramDelivery {
    #[must_use]
    pub fn new(api: TelegramClient, chat_id: i64) -> Self {
        Self { api, chat_id }
    }
}

#[async_trait]
impl Delivery for TelegramDelivery {
    async fn deliver(
        &self,
        asset: &DownloadedAsset,
        caption: &str,
        _progress: &ProgressReporter,
    ) -> Result<()> {
        let kind = upload_kind(asset.kind(), asset.size());
        let send = || {
            self.api
                .send_file(self.chat_id, kind, asset.path(), asset.file_name(), caption)
        };

        let sent = match send().await {
            Err(TelegramError::RetryAfter(secs)) => {
                warn!(chat_id = self.chat_id, secs, "Upload throttled, retrying once");
                tokio::time::sleep(Duration::from_secs(secs)).await;
                send().await
            }
            other => other,
        }
        .with_context(|| format!("Failed to upload {}", asset.file_name()))?;

        info!(
            chat_id = self.chat_id,
            message_id = sent.message_id,
            kind = ?kind,
            size = asset.size(),
            sha256 = %asset.sha256(),
            "Delivered file"
        );
        Ok(())
    }
}
