//! Telegram front end: commands, callbacks, inline queries and payments.

mod commands;
mod delivery;
mod handlers;
mod keyboards;
mod rate_limit;
mod runner;
mod sessions;
mod status;

pub use commands::{find_url, mentions, Command};
pub use delivery::{upload_kind, TelegramDelivery};
pub use keyboards::{CallbackAction, MenuButton};
pub use rate_limit::UserRateLimiter;
pub use runner::run;
pub use sessions::{PendingUrls, PENDING_TTL};
pub use status::StatusMessage;

use std::num::NonZeroU32;
use std::sync::Arc;

use crate::db::Database;
use crate::dispatcher::Dispatcher;
use crate::telegram::TelegramClient;

/// Shared state of the running bot. Each update is handled on its own task
/// holding an `Arc<Bot>`.
pub struct Bot {
    api: TelegramClient,
    db: Database,
    dispatcher: Arc<Dispatcher>,
    pending: PendingUrls,
    limiter: UserRateLimiter,
    username: String,
}

impl Bot {
    #[must_use]
    pub fn new(
        api: TelegramClient,
        db: Database,
        dispatcher: Arc<Dispatcher>,
        username: impl Into<String>,
        requests_per_minute: NonZeroU32,
    ) -> Self {
        Self {
            api,
            db,
            dispatcher,
            pending: PendingUrls::default(),
            limiter: UserRateLimiter::new(requests_per_minute),
            username: username.into(),
        }
    }

    #[must_use]
    pub fn api(&self) -> &TelegramClient {
        &self.api
    }

    /// The bot's `@username`, without the `@`.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Drop expired selections and idle rate-limit state.
    pub async fn housekeeping(&self) {
        let expired = self.pending.purge_expired().await;
        self.limiter.prune();
        tracing::debug!(
            expired,
            tracked_users = self.limiter.tracked_users(),
            "Housekeeping done"
        );
    }
}
