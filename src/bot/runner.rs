//! Long-polling update loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::Bot;
use crate::telegram::TelegramError;

/// How often expired selections and rate-limit state are dropped.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

/// Longest wait between failed polls.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Poll for updates until `shutdown` is cancelled, handling each update on
/// its own task.
///
/// Updates queued while the bot was offline are dropped at start-up.
///
/// # Errors
///
/// Returns an error if the webhook cannot be removed.
pub async fn run(bot: Arc<Bot>, poll_timeout: Duration, shutdown: CancellationToken) -> Result<()> {
    bot.api()
        .delete_webhook(true)
        .await
        .context("Failed to remove webhook")?;
    info!(username = %bot.username(), "Polling for updates");

    let housekeeping = tokio::spawn({
        let bot = Arc::clone(&bot);
        let shutdown = shutdown.clone();
        async move {
            let mut interval = tokio::time::interval(HOUSEKEEPING_INTERVAL);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = interval.tick() => bot.housekeeping().await,
                }
            }
        }
    });

    let mut offset = 0;
    let mut consecutive_failures = 0u32;

    loop {
        let polled = tokio::select! {
            () = shutdown.cancelled() => break,
            polled = bot.api().get_updates(offset, poll_timeout) => polled,
        };

        let delay = match polled {
            Ok(updates) => {
                consecutive_failures = 0;
                if !updates.is_empty() {
                    debug!(count = updates.len(), "Received updates");
                }
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let bot = Arc::clone(&bot);
                    tokio::spawn(async move { bot.handle_update(update).await });
                }
                continue;
            }
            Err(TelegramError::RetryAfter(secs)) => {
                warn!(secs, "Polling throttled by Telegram");
                Duration::from_secs(secs)
            }
            Err(e) => {
                consecutive_failures = consecutive_failures.saturating_add(1);
                error!(consecutive_failures, "Failed to fetch updates: {e}");
                backoff(consecutive_failures)
            }
        };

        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    housekeeping.abort();
    info!("Stopped polling");
    Ok(())
}

/// Exponential backoff capped at [`MAX_BACKOFF`].
fn backoff(consecutive_failures: u32) -> Duration {
    let secs = 1u64 << consecutive_failures.saturating_sub(1).min(6);
    Duration::from_secs(secs).min(MAX_BACKOFF)
}
