//! Resolution shared by extractors backed by yt-dlp.

use super::context::ExtractContext;
use super::traits::{FormatChoice, MediaFormat, MediaKind, MediaSource, Platform, ResolvedMedia};
use crate::download::MediaInfo;
use crate::error::DownloadError;
use crate::progress::{ProgressReporter, Stage};

/// Format selector for a choice; specific ids are merged with the best audio.
pub(crate) fn selector_for(choice: &FormatChoice, best: &str) -> String {
    match choice {
        FormatChoice::Best => best.to_string(),
        FormatChoice::Id(id) => format!("{id}+bestaudio/{id}"),
    }
}

/// List the height-labelled formats of a URL.
pub(crate) async fn list_formats(
    url: &str,
    platform: Platform,
    ctx: &ExtractContext,
    progress: &ProgressReporter,
) -> Result<Vec<MediaFormat>, DownloadError> {
    progress.report(Stage::GettingInfo, 10);
    let cookies = ctx.cookies_for(platform.as_str());
    let info = ctx.ytdlp.probe(url, None, cookies.as_deref()).await?;
    progress.report(Stage::GettingInfo, 100);
    Ok(info.quality_formats("mp4"))
}

/// Probe a URL with a format selector and build the stream reference.
///
/// Single-stream selections are fetched directly over HTTP with the headers
/// yt-dlp reports; merged selections are left for yt-dlp to download and mux.
/// The caption is left empty for the caller to fill in.
pub(crate) async fn resolve_selection(
    url: &str,
    selector: &str,
    platform: Platform,
    ctx: &ExtractContext,
    progress: &ProgressReporter,
) -> Result<(MediaInfo, ResolvedMedia), DownloadError> {
    progress.report(Stage::GettingInfo, 10);
    let cookies = ctx.cookies_for(platform.as_str());
    let info = ctx.ytdlp.probe(url, Some(selector), cookies.as_deref()).await?;
    progress.report(Stage::GettingInfo, 100);

    let media = media_from_info(url, selector, &info, cookies);
    Ok((info, media))
}

pub(crate) fn media_from_info(
    url: &str,
    selector: &str,
    info: &MediaInfo,
    cookies: Option<std::path::PathBuf>,
) -> ResolvedMedia {
    let (source, container) = match &info.url {
        Some(direct) if info.is_single_stream() => {
            let mut headers: Vec<(String, String)> = info
                .http_headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            headers.sort();
            (
                MediaSource::Direct {
                    url: direct.clone(),
                    headers,
                },
                info.ext.clone().unwrap_or_else(|| "mp4".to_string()),
            )
        }
        _ => (
            MediaSource::YtDlp {
                url: url.to_string(),
                format: selector.to_string(),
                cookies,
            },
            // Merged output is always remuxed to mp4
            "mp4".to_string(),
        ),
    };

    ResolvedMedia {
        kind: MediaKind::from_extension(&container),
        source,
        container,
        size_estimate: info.size_estimate(),
        file_stem: info
            .title
            .clone()
            .or_else(|| info.id.clone())
            .unwrap_or_else(|| "media".to_string()),
        caption: String::new(),
    }
}
