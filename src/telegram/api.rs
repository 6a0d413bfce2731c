//! Minimal Bot API client over HTTPS.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use super::types::{
    ChatMember, InlineQueryResultArticle, LabeledPrice, Message, ReplyMarkup, Update, User,
};

/// Timeout for ordinary (non-polling, non-upload) calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },
    #[error("flood control exceeded, retry after {0} seconds")]
    RetryAfter(u64),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TelegramError {
    /// An edit that would not change the message.
    #[must_use]
    pub fn is_not_modified(&self) -> bool {
        matches!(self, Self::Api { description, .. } if description.contains("message is not modified"))
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TelegramError> {
        if self.ok {
            return self
                .result
                .ok_or_else(|| TelegramError::Decode("ok response without result".to_string()));
        }
        if let Some(secs) = self.parameters.and_then(|p| p.retry_after) {
            return Err(TelegramError::RetryAfter(secs));
        }
        Err(TelegramError::Api {
            code: self.error_code.unwrap_or_default(),
            description: self
                .description
                .unwrap_or_else(|| "no description".to_string()),
        })
    }
}

/// How an uploaded file is presented in the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Video,
    Audio,
    Photo,
    Document,
}

impl UploadKind {
    fn method_and_field(self) -> (&'static str, &'static str) {
        match self {
            Self::Video => ("sendVideo", "video"),
            Self::Audio => ("sendAudio", "audio"),
            Self::Photo => ("sendPhoto", "photo"),
            Self::Document => ("sendDocument", "document"),
        }
    }
}

/// Bot API client bound to one bot token.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    /// Create a client for `token` against `api_url` (normally
    /// `https://api.telegram.org`).
    #[must_use]
    pub fn new(http: reqwest::Client, api_url: &str, token: &str) -> Self {
        Self {
            http,
            base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        method: &str,
    ) -> Result<T, TelegramError> {
        let status = response.status();
        let body = response.bytes().await?;
        let envelope: ApiResponse<T> = serde_json::from_slice(&body).map_err(|e| {
            TelegramError::Decode(format!("{method} returned HTTP {status}: {e}"))
        })?;
        envelope.into_result()
    }

    /// Call a JSON method.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an unsuccessful API response.
    pub async fn call<P, T>(&self, method: &str, params: &P) -> Result<T, TelegramError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call_with_timeout(method, params, REQUEST_TIMEOUT).await
    }

    async fn call_with_timeout<P, T>(
        &self,
        method: &str,
        params: &P,
        timeout: Duration,
    ) -> Result<T, TelegramError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(method, "Bot API call");
        let response = self
            .http
            .post(self.method_url(method))
            .json(params)
            .timeout(timeout)
            .send()
            .await?;
        Self::decode(response, method).await
    }

    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &json!({})).await
    }

    /// Remove any webhook, optionally dropping queued updates.
    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<bool, TelegramError> {
        self.call(
            "deleteWebhook",
            &json!({ "drop_pending_updates": drop_pending_updates }),
        )
        .await
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<Update>, TelegramError> {
        let params = json!({
            "offset": offset,
            "timeout": timeout.as_secs(),
            "allowed_updates": ["message", "callback_query", "inline_query", "pre_checkout_query"],
        });
        // Leave headroom over the server-side poll timeout
        self.call_with_timeout("getUpdates", &params, timeout + Duration::from_secs(10))
            .await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&ReplyMarkup>,
    ) -> Result<Message, TelegramError> {
        let mut params = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if let Some(markup) = reply_markup {
            params["reply_markup"] = serde_json::to_value(markup)
                .map_err(|e| TelegramError::Decode(e.to_string()))?;
        }
        self.call("sendMessage", &params).await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<&ReplyMarkup>,
    ) -> Result<(), TelegramError> {
        let mut params = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if let Some(markup) = reply_markup {
            params["reply_markup"] = serde_json::to_value(markup)
                .map_err(|e| TelegramError::Decode(e.to_string()))?;
        }
        // Result is the edited message, or `true` for inline messages
        let _: serde_json::Value = self.call("editMessageText", &params).await?;
        Ok(())
    }

    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<bool, TelegramError> {
        self.call(
            "deleteMessage",
            &json!({ "chat_id": chat_id, "message_id": message_id }),
        )
        .await
    }

    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<bool, TelegramError> {
        let mut params = json!({ "callback_query_id": callback_query_id });
        if let Some(text) = text {
            params["text"] = json!(text);
        }
        self.call("answerCallbackQuery", &params).await
    }

    pub async fn answer_inline_query(
        &self,
        inline_query_id: &str,
        results: &[InlineQueryResultArticle],
    ) -> Result<bool, TelegramError> {
        self.call(
            "answerInlineQuery",
            &json!({
                "inline_query_id": inline_query_id,
                "results": results,
                "cache_time": 0,
            }),
        )
        .await
    }

    /// Send an invoice. Telegram Stars invoices use an empty provider token.
    pub async fn send_invoice(
        &self,
        chat_id: i64,
        title: &str,
        description: &str,
        payload: &str,
        currency: &str,
        prices: &[LabeledPrice],
    ) -> Result<Message, TelegramError> {
        self.call(
            "sendInvoice",
            &json!({
                "chat_id": chat_id,
                "title": title,
                "description": description,
                "payload": payload,
                "provider_token": "",
                "currency": currency,
                "prices": prices,
            }),
        )
        .await
    }

    pub async fn answer_pre_checkout_query(
        &self,
        pre_checkout_query_id: &str,
        ok: bool,
        error_message: Option<&str>,
    ) -> Result<bool, TelegramError> {
        let mut params = json!({ "pre_checkout_query_id": pre_checkout_query_id, "ok": ok });
        if let Some(message) = error_message {
            params["error_message"] = json!(message);
        }
        self.call("answerPreCheckoutQuery", &params).await
    }

    pub async fn get_chat_member(&self, chat_id: i64, user_id: i64) -> Result<ChatMember, TelegramError> {
        self.call(
            "getChatMember",
            &json!({ "chat_id": chat_id, "user_id": user_id }),
        )
        .await
    }

    /// Upload a local file as a chat message, streaming it from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the upload is rejected.
    pub async fn send_file(
        &self,
        chat_id: i64,
        kind: UploadKind,
        path: &Path,
        file_name: &str,
        caption: &str,
    ) -> Result<Message, TelegramError> {
        let (method, field) = kind.method_and_field();
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        let part = Part::stream_with_length(
            reqwest::Body::wrap_stream(ReaderStream::new(file)),
            len,
        )
        .file_name(file_name.to_string())
        .mime_str(mime.as_ref())?;

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part(field, part);
        if !caption.is_empty() {
            form = form
                .text("caption", caption.to_string())
                .text("parse_mode", "HTML");
        }
        if kind == UploadKind::Video {
            form = form.text("supports_streaming", "true");
        }

        debug!(method, chat_id, size = len, file = %file_name, "Uploading file");
        let response = self
            .http
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await?;
        let result = Self::decode(response, method).await;
        if let Err(e) = &result {
            warn!(method, chat_id, "Upload failed: {e}");
        }
        result
    }
}
