//! Telegram Bot API client and types.

mod api;
pub mod types;

pub use api::{TelegramClient, TelegramError, UploadKind};
