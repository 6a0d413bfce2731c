use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::constants::TELEGRAM_UPLOAD_LIMIT_BYTES;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_api_url: String,
    pub poll_timeout: Duration,

    // Yandex Music
    pub yandex_music_token: Option<String>,
    pub yandex_music_api_url: String,

    // Storage
    pub database_path: PathBuf,
    pub downloads_dir: PathBuf,
    pub cookies_dir: PathBuf,

    // Downloads
    pub yt_dlp_path: String,
    pub max_upload_bytes: u64,
    pub download_timeout: Duration,
    pub max_concurrent_downloads: usize,
    pub per_platform_concurrency: usize,
    pub youtube_enabled: bool,

    // Front end
    pub user_requests_per_minute: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Telegram
            telegram_bot_token: required_env("TELEGRAM_BOT_TOKEN")?,
            telegram_api_url: env_or_default("TELEGRAM_API_URL", "https://api.telegram.org"),
            poll_timeout: parse_env_secs("POLL_TIMEOUT_SECS", 30)?,

            // Yandex Music
            yandex_music_token: optional_env("YANDEX_MUSIC_TOKEN"),
            yandex_music_api_url: env_or_default(
                "YANDEX_MUSIC_API_URL",
                "https://api.music.yandex.net",
            ),

            // Storage
            database_path: PathBuf::from(env_or_default("DATABASE_PATH", "./zenload.sqlite")),
            downloads_dir: PathBuf::from(env_or_default("DOWNLOADS_DIR", "./downloads")),
            cookies_dir: PathBuf::from(env_or_default("COOKIES_DIR", "./cookies")),

            // Downloads
            yt_dlp_path: env_or_default("YT_DLP_PATH", "yt-dlp"),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", TELEGRAM_UPLOAD_LIMIT_BYTES)?,
            download_timeout: parse_env_secs("DOWNLOAD_TIMEOUT_SECS", 300)?,
            max_concurrent_downloads: parse_env("MAX_CONCURRENT_DOWNLOADS", 4)?,
            per_platform_concurrency: parse_env("PER_PLATFORM_CONCURRENCY", 2)?,
            youtube_enabled: parse_env_bool("YOUTUBE_ENABLED", true)?,

            // Front end
            user_requests_per_minute: parse_env("USER_REQUESTS_PER_MINUTE", 5)?,
        })
    }

    /// Configuration with defaults suitable for tests. Paths point at the
    /// current directory and should be overridden with temp dirs.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            telegram_bot_token: "123456:TEST-TOKEN".to_string(),
            telegram_api_url: "http://127.0.0.1:9".to_string(),
            poll_timeout: Duration::from_secs(1),
            yandex_music_token: None,
            yandex_music_api_url: "http://127.0.0.1:9".to_string(),
            database_path: PathBuf::from("./test.sqlite"),
            downloads_dir: PathBuf::from("./downloads"),
            cookies_dir: PathBuf::from("./cookies"),
            yt_dlp_path: "yt-dlp".to_string(),
            max_upload_bytes: TELEGRAM_UPLOAD_LIMIT_BYTES,
            download_timeout: Duration::from_secs(30),
            max_concurrent_downloads: 2,
            per_platform_concurrency: 1,
            youtube_enabled: true,
            user_requests_per_minute: 5,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_bot_token.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "TELEGRAM_BOT_TOKEN".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if !self.telegram_bot_token.contains(':') {
            return Err(ConfigError::InvalidValue {
                name: "TELEGRAM_BOT_TOKEN".to_string(),
                message: "expected the `<bot id>:<secret>` form issued by BotFather".to_string(),
            });
        }
        for (name, value) in [
            ("MAX_CONCURRENT_DOWNLOADS", self.max_concurrent_downloads as u64),
            ("PER_PLATFORM_CONCURRENCY", self.per_platform_concurrency as u64),
            ("USER_REQUESTS_PER_MINUTE", u64::from(self.user_requests_per_minute)),
            ("MAX_UPLOAD_BYTES", self.max_upload_bytes),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Path of the Netscape cookie file for a platform (`cookies/{platform}.txt`).
    #[must_use]
    pub fn cookies_file(&self, platform: &str) -> PathBuf {
        self.cookies_dir.join(format!("{platform}.txt"))
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    optional_env(name).ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    optional_env(name).unwrap_or_else(|| default.to_string())
}

/// Integer variable, or `default` when unset or empty.
fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr<Err = ParseIntError>,
{
    optional_env(name).map_or(Ok(default), |val| {
        val.parse().map_err(|source| ConfigError::ParseInt {
            name: name.to_string(),
            source,
        })
    })
}

fn parse_env_secs(name: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    parse_env(name, default_secs).map(Duration::from_secs)
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(val) = optional_env(name) else {
        return Ok(default);
    };
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::ParseBool {
            name: name.to_string(),
            value: val,
        }),
    }
}
