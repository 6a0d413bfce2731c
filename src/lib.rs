//! Zenload library.
//!
//! A Telegram bot that takes shared links from Instagram, TikTok, YouTube,
//! Pinterest and Yandex Music, downloads the media and sends it back.

pub mod bot;
pub mod config;
pub mod constants;
pub mod db;
pub mod dispatcher;
pub mod download;
pub mod error;
pub mod extractors;
pub mod locales;
pub mod progress;
pub mod telegram;
