use std::cmp::Reverse;

use tracing::info;

use super::instagram::InstagramExtractor;
use super::pinterest::PinterestExtractor;
use super::tiktok::TikTokExtractor;
use super::traits::Extractor;
use super::yandex::YandexMusicExtractor;
use super::youtube::YouTubeExtractor;
use crate::config::Config;

/// Registry of platform extractors.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Registry with every extractor the configuration enables.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(InstagramExtractor::new()));
        registry.register(Box::new(TikTokExtractor::new()));
        registry.register(Box::new(PinterestExtractor::new()));
        registry.register(Box::new(YandexMusicExtractor::new()));
        if config.youtube_enabled {
            registry.register(Box::new(YouTubeExtractor::new()));
        } else {
            info!("YouTube extractor disabled by configuration");
        }
        registry
    }

    /// Register an extractor.
    pub fn register(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.push(extractor);
        // Sort by priority (highest first)
        self.extractors.sort_by_key(|e| Reverse(e.priority()));
    }

    /// Find the best extractor for a URL.
    #[must_use]
    pub fn find(&self, url: &str) -> Option<&dyn Extractor> {
        self.extractors
            .iter()
            .find(|e| e.can_handle(url))
            .map(AsRef::as_ref)
    }

    /// Get all registered extractors.
    #[must_use]
    pub fn extractors(&self) -> &[Box<dyn Extractor>] {
        &self.extractors
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
