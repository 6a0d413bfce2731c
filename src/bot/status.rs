//! The per-request status message and its progress edits.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::locales::{t, tf, Language, Msg};
use crate::progress::{Progress, Stage};
use crate::telegram::types::ReplyMarkup;
use crate::telegram::{TelegramClient, TelegramError};

/// Minimum spacing between two progress edits of the same message.
pub const EDIT_INTERVAL: Duration = Duration::from_millis(1500);

/// Localized status line for a progress value.
#[must_use]
pub fn render(lang: Language, progress: Progress) -> String {
    let key = match progress.stage {
        Stage::GettingInfo => Msg::StatusGettingInfo,
        Stage::Downloading => Msg::StatusDownloading,
        Stage::Sending => Msg::StatusSending,
    };
    tf(lang, key, &[("progress", &progress.percent.to_string())])
}

/// A bot message that tracks one request and is deleted when it finishes.
pub struct StatusMessage {
    api: TelegramClient,
    chat_id: i64,
    message_id: i64,
    lang: Language,
    updates: Option<JoinHandle<()>>,
}

impl StatusMessage {
    /// Post a new "processing" message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be sent.
    pub async fn post(
        api: &TelegramClient,
        chat_id: i64,
        lang: Language,
    ) -> Result<Self, TelegramError> {
        let message = api
            .send_message(chat_id, &t(lang, Msg::Processing), None)
            .await?;
        Ok(Self::existing(api, chat_id, message.message_id, lang))
    }

    /// Take over a message the bot already sent, e.g. a format keyboard.
    #[must_use]
    pub fn existing(api: &TelegramClient, chat_id: i64, message_id: i64, lang: Language) -> Self {
        Self {
            api: api.clone(),
            chat_id,
            message_id,
            lang,
            updates: None,
        }
    }

    #[must_use]
    pub fn message_id(&self) -> i64 {
        self.message_id
    }

    /// Replace the message text, ignoring "not modified" rejections.
    ///
    /// # Errors
    ///
    /// Returns any other Bot API error.
    pub async fn set_text(
        &self,
        text: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<(), TelegramError> {
        match self
            .api
            .edit_message_text(self.chat_id, self.message_id, text, markup)
            .await
        {
            Err(e) if e.is_not_modified() => Ok(()),
            other => other,
        }
    }

    /// Start editing the message whenever `progress` changes.
    ///
    /// Edits are spaced by [`EDIT_INTERVAL`]; intermediate values are
    /// skipped and an unchanged text is never re-sent. The task ends once
    /// every reporter for `progress` is dropped.
    pub fn follow(&mut self, mut progress: watch::Receiver<Progress>) {
        if let Some(previous) = self.updates.take() {
            previous.abort();
        }

        let api = self.api.clone();
        let (chat_id, message_id, lang) = (self.chat_id, self.message_id, self.lang);
        self.updates = Some(tokio::spawn(async move {
            let mut last_text = String::new();
            while progress.changed().await.is_ok() {
                let text = render(lang, *progress.borrow_and_update());
                if text == last_text {
                    continue;
                }
                match api.edit_message_text(chat_id, message_id, &text, None).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_modified() => {}
                    Err(TelegramError::RetryAfter(secs)) => {
                        debug!(chat_id, secs, "Status edit throttled by Telegram");
                        tokio::time::sleep(Duration::from_secs(secs)).await;
                    }
                    Err(e) => debug!(chat_id, message_id, "Status edit failed: {e}"),
                }
                last_text = text;
                tokio::time::sleep(EDIT_INTERVAL).await;
            }
        }));
    }

    /// Stop progress edits and delete the message.
    pub async fn finish(mut self) {
        if let Some(updates) = self.updates.take() {
            updates.abort();
        }
        if let Err(e) = self.api.delete_message(self.chat_id, self.message_id).await {
            warn!(
                chat_id = self.chat_id,
                message_id = self.message_id,
                "Failed to delete status message: {e}"
            );
        }
    }
}

impl Drop for StatusMessage {
    fn drop(&mut self) {
        if let Some(updates) = self.updates.take() {
            updates.abort();
        }
    }
}
