//! Yandex Music tracks, fetched through the mobile API with an OAuth token.

use async_trait::async_trait;
use md5::{Digest, Md5};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use super::caption::{format_duration, html_escape, sanitize_file_stem};
use super::context::ExtractContext;
use super::traits::{
    Extractor, FormatChoice, MediaFormat, MediaKind, MediaSource, Platform, ResolvedMedia,
};
use crate::error::DownloadError;
use crate::progress::{ProgressReporter, Stage};

static PATTERNS: std::sync::LazyLock<Vec<Regex>> = std::sync::LazyLock::new(|| {
    vec![
        Regex::new(r"music\.yandex\.[a-z]+/album/(\d+)/track/(\d+)").unwrap(),
        Regex::new(r"music\.yandex\.[a-z]+/track/(\d+)").unwrap(),
    ]
});

static ALBUM_TRACK: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"album/(\d+)/track/(\d+)").unwrap());

static TRACK: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"track/(\d+)").unwrap());

/// Salt mixed into the direct-link signature.
const SIGN_SALT: &str = "XGRlBW9FXlekgbPrRHuSiA";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Track {
    title: String,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    artists: Vec<Named>,
    #[serde(default)]
    albums: Vec<Album>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Album {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadInfo {
    codec: String,
    bitrate_in_kbps: u32,
    download_info_url: String,
}

/// Parsed `<download-info>` XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    pub host: String,
    pub path: String,
    pub ts: String,
    pub s: String,
}

impl StorageLocation {
    /// Parse the XML returned by a `downloadInfoUrl`.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the required elements is missing.
    pub fn parse(xml: &str) -> Result<Self, DownloadError> {
        Ok(Self {
            host: xml_element(xml, "host")?,
            path: xml_element(xml, "path")?,
            ts: xml_element(xml, "ts")?,
            s: xml_element(xml, "s")?,
        })
    }

    /// Signed direct MP3 link.
    #[must_use]
    pub fn direct_link(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(SIGN_SALT.as_bytes());
        hasher.update(self.path.get(1..).unwrap_or_default().as_bytes());
        hasher.update(self.s.as_bytes());
        let sign = hex::encode(hasher.finalize());
        format!("https://{}/get-mp3/{sign}/{}{}", self.host, self.ts, self.path)
    }
}

fn xml_element(xml: &str, name: &str) -> Result<String, DownloadError> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let start = xml
        .find(&open)
        .map(|i| i + open.len())
        .ok_or_else(|| DownloadError::Extraction(format!("download info lacks <{name}>")))?;
    let len = xml[start..]
        .find(&close)
        .ok_or_else(|| DownloadError::Extraction(format!("download info lacks </{name}>")))?;
    Ok(xml[start..start + len].trim().to_string())
}

/// `{track}:{album}` for album links, `{track}` otherwise.
fn track_id(url: &str) -> Option<String> {
    if let Some(caps) = ALBUM_TRACK.captures(url) {
        return Some(format!("{}:{}", &caps[2], &caps[1]));
    }
    TRACK.captures(url).map(|caps| caps[1].to_string())
}

fn build_caption(track: &Track, artists: &str) -> String {
    let mut parts = vec![html_escape(&track.title)];
    if !artists.is_empty() {
        parts.push(format!("By: {}", html_escape(artists)));
    }
    if let Some(album) = track.albums.first().and_then(|a| a.title.as_deref()) {
        if !album.is_empty() {
            parts.push(format!("Album: {}", html_escape(album)));
        }
    }
    parts.push(format!("Length: {}", format_duration(track.duration_ms / 1000)));
    parts.join(" | ")
}

pub struct YandexMusicExtractor;

impl YandexMusicExtractor {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        ctx: &ExtractContext,
        token: &str,
        path: &str,
    ) -> Result<T, DownloadError> {
        let url = format!("{}{path}", ctx.yandex_api_url);
        debug!(url = %url, "Yandex Music API request");
        let response = ctx
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, format!("OAuth {token}"))
            .send()
            .await?
            .error_for_status()?;
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| DownloadError::Extraction(format!("unexpected Yandex Music response: {e}")))?;
        Ok(body.result)
    }
}

impl Default for YandexMusicExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extractor for YandexMusicExtractor {
    fn platform(&self) -> Platform {
        Platform::YandexMusic
    }

    fn url_patterns(&self) -> &[Regex] {
        &PATTERNS
    }

    fn priority(&self) -> i32 {
        100
    }

    async fn formats(
        &self,
        _url: &str,
        _ctx: &ExtractContext,
        _progress: &ProgressReporter,
    ) -> Result<Vec<MediaFormat>, DownloadError> {
        Ok(vec![MediaFormat {
            id: "mp3".to_string(),
            quality: "MP3 320kbps".to_string(),
            ext: "mp3".to_string(),
        }])
    }

    async fn resolve(
        &self,
        url: &str,
        _choice: &FormatChoice,
        ctx: &ExtractContext,
        progress: &ProgressReporter,
    ) -> Result<ResolvedMedia, DownloadError> {
        let token = ctx
            .yandex_token
            .as_deref()
            .ok_or(DownloadError::NotConfigured("YANDEX_MUSIC_TOKEN"))?;
        let id = track_id(url).ok_or_else(|| DownloadError::UnsupportedUrl(url.to_string()))?;

        info!(track_id = %id, "Resolving Yandex Music track");
        progress.report(Stage::GettingInfo, 10);

        let tracks: Vec<Track> = Self::get_json(ctx, token, &format!("/tracks/{id}")).await?;
        let track = tracks.into_iter().next().ok_or(DownloadError::NotFound)?;
        progress.report(Stage::GettingInfo, 40);

        let infos: Vec<DownloadInfo> =
            Self::get_json(ctx, token, &format!("/tracks/{id}/download-info")).await?;
        let best = infos
            .into_iter()
            .filter(|i| i.codec.eq_ignore_ascii_case("mp3"))
            .max_by_key(|i| i.bitrate_in_kbps)
            .ok_or(DownloadError::NoMedia)?;
        debug!(bitrate = best.bitrate_in_kbps, "Selected Yandex Music stream");
        progress.report(Stage::GettingInfo, 70);

        let xml = ctx
            .http
            .get(&best.download_info_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let location = StorageLocation::parse(&xml)?;
        progress.report(Stage::GettingInfo, 100);

        let artists = track
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        Ok(ResolvedMedia {
            source: MediaSource::Direct {
                url: location.direct_link(),
                headers: Vec::new(),
            },
            container: "mp3".to_string(),
            kind: MediaKind::Audio,
            size_estimate: None,
            file_stem: sanitize_file_stem(&format!("{artists} - {}", track.title)),
            caption: build_caption(&track, &artists),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_handle() {
        let extractor = YandexMusicExtractor::new();
        assert!(extractor.can_handle("https://music.yandex.ru/album/123/track/456"));
        assert!(extractor.can_handle("https://music.yandex.com/track/456"));
        assert!(!extractor.can_handle("https://music.yandex.ru/artist/789"));
        assert!(!extractor.can_handle("https://yandex.ru/video/123"));
    }

    #[test]
    fn test_track_id() {
        assert_eq!(
            track_id("https://music.yandex.ru/album/123/track/456?utm=x"),
            Some("456:123".to_string())
        );
        assert_eq!(
            track_id("https://music.yandex.by/track/456"),
            Some("456".to_string())
        );
        assert_eq!(track_id("https://music.yandex.ru/artist/1"), None);
    }

    #[test]
    fn test_parse_download_info_xml() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<download-info><host>s123.storage.yandex.net</host><path>/rmusic/U2FsdGVk/abc</path><ts>0005f1c2</ts><region>-1</region><s>deadbeef</s></download-info>"#;
        let location = StorageLocation::parse(xml).unwrap();
        assert_eq!(location.host, "s123.storage.yandex.net");
        assert_eq!(location.path, "/rmusic/U2FsdGVk/abc");
        assert_eq!(location.ts, "0005f1c2");
        assert_eq!(location.s, "deadbeef");
    }

    #[test]
    fn test_parse_download_info_missing_element() {
        let err = StorageLocation::parse("<download-info><host>h</host></download-info>");
        assert!(matches!(err, Err(DownloadError::Extraction(_))));
    }

    #[test]
    fn test_direct_link_signature() {
        let location = StorageLocation {
            host: "s1.storage.yandex.net".to_string(),
            path: "/get/track".to_string(),
            ts: "0005".to_string(),
            s: "abc".to_string(),
        };

        let mut hasher = Md5::new();
        hasher.update(b"XGRlBW9FXlekgbPrRHuSiAget/trackabc");
        let expected = hex::encode(hasher.finalize());

        assert_eq!(
            location.direct_link(),
            format!("https://s1.storage.yandex.net/get-mp3/{expected}/0005/get/track")
        );
    }

    #[test]
    fn test_caption() {
        let track = Track {
            title: "Song".to_string(),
            duration_ms: 215_000,
            artists: vec![],
            albums: vec![Album {
                title: Some("Album".to_string()),
            }],
        };
        assert_eq!(
            build_caption(&track, "A, B"),
            "Song | By: A, B | Album: Album | Length: 3:35"
        );
    }
}
