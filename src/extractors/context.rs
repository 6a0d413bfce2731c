use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::constants::BROWSER_USER_AGENT;
use crate::download::YtDlp;

/// Shared resources handed to every extractor call.
#[derive(Debug, Clone)]
pub struct ExtractContext {
    pub http: reqwest::Client,
    pub ytdlp: YtDlp,
    pub cookies_dir: PathBuf,
    pub yandex_token: Option<String>,
    pub yandex_api_url: String,
}

impl ExtractContext {
    /// Build the context from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(config.download_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            ytdlp: YtDlp::new(config.yt_dlp_path.clone(), config.download_timeout),
            cookies_dir: config.cookies_dir.clone(),
            yandex_token: config.yandex_music_token.clone(),
            yandex_api_url: config.yandex_music_api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Cookie file for a platform, if one is present on disk.
    #[must_use]
    pub fn cookies_for(&self, platform: &str) -> Option<PathBuf> {
        let path = self.cookies_dir.join(format!("{platform}.txt"));
        path.is_file().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookies_for_only_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("instagram.txt"), "# Netscape HTTP Cookie File\n").unwrap();
        std::fs::create_dir(dir.path().join("tiktok.txt")).unwrap();

        let config = Config {
            cookies_dir: dir.path().to_path_buf(),
            ..Config::for_testing()
        };
        let ctx = ExtractContext::from_config(&config).unwrap();

        assert_eq!(
            ctx.cookies_for("instagram"),
            Some(dir.path().join("instagram.txt"))
        );
        assert!(ctx.cookies_for("tiktok").is_none());
        assert!(ctx.cookies_for("pinterest").is_none());
    }
}
