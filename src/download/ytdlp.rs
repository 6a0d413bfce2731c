use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::DownloadError;
use crate::extractors::MediaFormat;
use crate::progress::{ProgressReporter, Stage};

/// Media metadata from yt-dlp --dump-json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    /// Direct stream URL; only present when the selection is a single format.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub http_headers: HashMap<String, String>,
    #[serde(default)]
    pub formats: Vec<FormatInfo>,
    #[serde(default)]
    pub requested_formats: Vec<FormatInfo>,
    #[serde(default)]
    pub filesize: Option<f64>,
    #[serde(default)]
    pub filesize_approx: Option<f64>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// One entry of the `formats` array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatInfo {
    pub format_id: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub filesize: Option<f64>,
    #[serde(default)]
    pub filesize_approx: Option<f64>,
}

impl MediaInfo {
    /// Best known size of the selected stream(s).
    #[must_use]
    pub fn size_estimate(&self) -> Option<u64> {
        if let Some(size) = self.filesize.or(self.filesize_approx) {
            return Some(size as u64);
        }
        if self.requested_formats.is_empty() {
            return None;
        }
        // Merged selections report sizes per component stream
        self.requested_formats
            .iter()
            .map(|f| f.filesize.or(f.filesize_approx))
            .sum::<Option<f64>>()
            .map(|s| s as u64)
    }

    /// Whether the selection maps to one directly fetchable stream.
    #[must_use]
    pub fn is_single_stream(&self) -> bool {
        self.url.is_some() && self.requested_formats.is_empty()
    }

    /// Formats with a known height, one per quality label, highest first.
    #[must_use]
    pub fn quality_formats(&self, default_ext: &str) -> Vec<MediaFormat> {
        let mut seen = HashSet::new();
        let mut formats: Vec<(u32, MediaFormat)> = Vec::new();

        for f in &self.formats {
            let Some(height) = f.height else {
                continue;
            };
            let quality = format!("{height}p");
            if seen.insert(quality.clone()) {
                formats.push((
                    height,
                    MediaFormat {
                        id: f.format_id.clone(),
                        quality,
                        ext: f.ext.clone().unwrap_or_else(|| default_ext.to_string()),
                    },
                ));
            }
        }

        formats.sort_by(|a, b| b.0.cmp(&a.0));
        formats.into_iter().map(|(_, f)| f).collect()
    }
}

/// Download progress information parsed from yt-dlp output.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    /// Progress percentage (0.0-100.0)
    pub percent: f64,
    /// Download speed (e.g., "2.34MiB/s")
    pub speed: Option<String>,
    /// Estimated time remaining (e.g., "00:15")
    pub eta: Option<String>,
    /// Total size (e.g., "~100MiB")
    pub total_size: Option<String>,
}

/// Parse download progress from a yt-dlp `--newline` output line.
///
/// Example yt-dlp progress lines:
/// - `[download]   15.2% of ~45.50MiB at 2.34MiB/s ETA 00:15`
/// - `[download] 100% of 45.50MiB in 00:20`
/// - `[download] Destination: filename.mp4`
#[must_use]
pub fn parse_ytdlp_progress(line: &str) -> Option<DownloadProgress> {
    if !line.contains("[download]") {
        return None;
    }

    if line.contains("Destination:")
        || line.contains("Resuming")
        || line.contains("has already been downloaded")
    {
        return None;
    }

    let pct_pos = line.find('%')?;
    let percent = line[..pct_pos]
        .split_whitespace()
        .last()?
        .parse::<f64>()
        .ok()?;

    let word_after = |marker: &str| {
        line.find(marker).and_then(|pos| {
            line[pos + marker.len()..]
                .split_whitespace()
                .next()
                .map(ToString::to_string)
        })
    };

    Some(DownloadProgress {
        percent,
        speed: word_after(" at "),
        eta: word_after("ETA "),
        total_size: word_after(" of "),
    })
}

/// yt-dlp invoker.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: String,
    timeout: Duration,
}

impl YtDlp {
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Fetch metadata without downloading.
    ///
    /// With a `format` selector the returned info describes that selection,
    /// including the direct `url` for single-stream selections.
    ///
    /// # Errors
    ///
    /// Returns an error if yt-dlp fails, times out, or prints unparsable JSON.
    pub async fn probe(
        &self,
        url: &str,
        format: Option<&str>,
        cookies: Option<&Path>,
    ) -> Result<MediaInfo, DownloadError> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--no-color".to_string(),
            "--quiet".to_string(),
        ];
        if let Some(format) = format {
            args.push("--format".to_string());
            args.push(format.to_string());
        }
        args.extend(cookie_args(cookies));
        args.push(url.to_string());

        debug!(url = %url, format = ?format, "Fetching media metadata");

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| self.spawn_error(e))?;
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| DownloadError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(url = %url, stderr = %stderr, "yt-dlp metadata fetch failed");
            return Err(DownloadError::from_ytdlp_stderr(&stderr));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| DownloadError::Extraction(format!("unreadable yt-dlp metadata: {e}")))
    }

    /// Download `url` with the given format selector into `out_dir`.
    ///
    /// Returns the path of the produced media file.
    ///
    /// # Errors
    ///
    /// Returns an error if yt-dlp fails, exceeds `max_bytes`, or times out.
    pub async fn download(
        &self,
        url: &str,
        format: &str,
        out_dir: &Path,
        cookies: Option<&Path>,
        max_bytes: u64,
        progress: &ProgressReporter,
    ) -> Result<PathBuf, DownloadError> {
        let output_template = out_dir.join("%(id)s.%(ext)s");

        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-color".to_string(),
            "--no-overwrites".to_string(),
            "--no-part".to_string(),
            // Use --newline for parseable progress output (each update on a new line)
            "--newline".to_string(),
            "--format".to_string(),
            format.to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "--max-filesize".to_string(),
            max_bytes.to_string(),
            "--output".to_string(),
            output_template.to_string_lossy().to_string(),
        ];
        args.extend(cookie_args(cookies));
        // URL goes last
        args.push(url.to_string());

        debug!(url = %url, format = %format, "Running yt-dlp");

        let mut child = Command::new(&self.program)
            .args(&args)
            .current_dir(out_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::Extraction("yt-dlp stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::Extraction("yt-dlp stderr unavailable".to_string()))?;

        let mut stdout_reader = BufReader::new(stdout).lines();
        let mut stderr_reader = BufReader::new(stderr).lines();
        let mut stderr_lines = Vec::new();
        let mut too_large = false;

        let streaming = async {
            let mut stdout_open = true;
            let mut stderr_open = true;
            while stdout_open || stderr_open {
                tokio::select! {
                    line = stdout_reader.next_line(), if stdout_open => match line {
                        Ok(Some(line)) => {
                            if line.contains("larger than max-filesize") {
                                too_large = true;
                            }
                            if let Some(p) = parse_ytdlp_progress(&line) {
                                progress.report(Stage::Downloading, p.percent as u8);
                            }
                        }
                        Ok(None) => stdout_open = false,
                        Err(e) => {
                            warn!("Error reading yt-dlp stdout: {e}");
                            stdout_open = false;
                        }
                    },
                    line = stderr_reader.next_line(), if stderr_open => match line {
                        Ok(Some(line)) => stderr_lines.push(line),
                        Ok(None) => stderr_open = false,
                        Err(e) => {
                            warn!("Error reading yt-dlp stderr: {e}");
                            stderr_open = false;
                        }
                    },
                }
            }
            child.wait().await
        };

        let status = tokio::time::timeout(self.timeout, streaming)
            .await
            .map_err(|_| DownloadError::Timeout(self.timeout.as_secs()))??;

        if too_large {
            return Err(DownloadError::FileTooLarge {
                size: 0,
                limit: max_bytes,
            });
        }

        if !status.success() {
            let stderr = stderr_lines.join("\n");
            return Err(match DownloadError::from_ytdlp_stderr(&stderr) {
                DownloadError::FileTooLarge { size, .. } => DownloadError::FileTooLarge {
                    size,
                    limit: max_bytes,
                },
                other => other,
            });
        }

        find_media_file(out_dir).await
    }

    fn spawn_error(&self, e: std::io::Error) -> DownloadError {
        if e.kind() == std::io::ErrorKind::NotFound {
            warn!(program = %self.program, "yt-dlp executable not found");
            DownloadError::NotConfigured("yt-dlp")
        } else {
            DownloadError::Io(e)
        }
    }
}

/// Cookie arguments for a Netscape cookie file, skipped when it is unusable.
fn cookie_args(cookies: Option<&Path>) -> Vec<String> {
    let Some(path) = cookies else {
        return Vec::new();
    };
    if !path.exists() {
        debug!(path = %path.display(), "Cookies file does not exist, continuing without cookies");
        return Vec::new();
    }
    if path.is_dir() {
        warn!(path = %path.display(), "Cookies path is a directory, continuing without cookies");
        return Vec::new();
    }
    vec!["--cookies".to_string(), path.to_string_lossy().to_string()]
}

/// Find the media file yt-dlp produced in a per-request directory.
///
/// The directory is private to one request, so the largest finished file is
/// the media itself.
async fn find_media_file(dir: &Path) -> Result<PathBuf, DownloadError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut best: Option<(u64, PathBuf)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if is_auxiliary_file(&name) {
            continue;
        }
        let meta = entry.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        if best.as_ref().is_none_or(|(size, _)| meta.len() > *size) {
            best = Some((meta.len(), path));
        }
    }

    best.map(|(_, path)| path).ok_or(DownloadError::NoMedia)
}

fn is_auxiliary_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".part")
        || lower.ends_with(".ytdl")
        || lower.ends_with(".json")
        || lower.ends_with(".temp")
        || lower.contains(".part-frag")
}
