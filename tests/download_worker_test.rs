//! Integration tests for the download worker against a mock CDN.

use std::path::Path;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zenload::download::{sweep_stale_downloads, Fetcher, YtDlp};
use zenload::error::DownloadError;
use zenload::extractors::{MediaKind, MediaSource, ResolvedMedia};
use zenload::progress::{ProgressReporter, Stage};

fn fetcher(downloads: &Path, max_bytes: u64, timeout: Duration) -> Fetcher {
    Fetcher::new(
        reqwest::Client::new(),
        YtDlp::new("yt-dlp", timeout),
        downloads.to_path_buf(),
        max_bytes,
        timeout,
    )
}

fn direct(url: String, headers: Vec<(String, String)>) -> ResolvedMedia {
    ResolvedMedia {
        source: MediaSource::Direct { url, headers },
        container: "mp4".to_string(),
        kind: MediaKind::Video,
        size_estimate: None,
        file_stem: "clip".to_string(),
        caption: String::new(),
    }
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(Iterator::count).unwrap_or(0)
}

/// Serve one chunked response without a Content-Length header.
async fn serve_chunked(chunks: usize, chunk_size: usize) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;

        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nTransfer-Encoding: chunked\r\n\r\n")
            .await;
        let chunk = vec![b'x'; chunk_size];
        for _ in 0..chunks {
            let _ = socket.write_all(format!("{chunk_size:x}\r\n").as_bytes()).await;
            let _ = socket.write_all(&chunk).await;
            let _ = socket.write_all(b"\r\n").await;
        }
        let _ = socket.write_all(b"0\r\n\r\n").await;
    });

    format!("http://{addr}/stream.mp4")
}

#[tokio::test]
async fn test_direct_download_reports_size_and_hash() {
    let server = MockServer::start().await;
    let body = vec![7u8; 300 * 1024];
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .and(header("Referer", "https://www.tiktok.com/"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let downloads = TempDir::new().unwrap();
    let (progress, rx) = ProgressReporter::channel();
    let media = direct(
        format!("{}/video.mp4", server.uri()),
        vec![("Referer".to_string(), "https://www.tiktok.com/".to_string())],
    );

    let asset = fetcher(downloads.path(), 1024 * 1024, Duration::from_secs(10))
        .fetch(&media, &progress)
        .await
        .expect("fetch failed");

    assert_eq!(asset.size(), body.len() as u64);
    assert_eq!(asset.sha256(), hex::encode(Sha256::digest(&body)));
    assert_eq!(asset.file_name(), "clip.mp4");
    assert_eq!(asset.kind(), MediaKind::Video);
    assert_eq!(std::fs::read(asset.path()).unwrap(), body);
    assert!(asset.dir().starts_with(downloads.path()));
    assert_eq!(rx.borrow().stage, Stage::Downloading);
    assert_eq!(rx.borrow().percent, 100);

    // Dropping the asset removes its directory
    let dir = asset.dir().to_path_buf();
    drop(asset);
    assert!(!dir.exists());
    assert_eq!(entries(downloads.path()), 0);
}

#[tokio::test]
async fn test_title_stems_become_safe_file_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 2048]))
        .expect(2)
        .mount(&server)
        .await;

    let downloads = TempDir::new().unwrap();
    let fetcher = fetcher(downloads.path(), 1024 * 1024, Duration::from_secs(10));

    let mut media = direct(format!("{}/video.mp4", server.uri()), Vec::new());
    media.file_stem = "AC/DC - Thunderstruck (Live)".to_string();
    let asset = fetcher
        .fetch(&media, &ProgressReporter::detached())
        .await
        .expect("fetch with a slash in the title failed");
    assert_eq!(asset.file_name(), "AC_DC - Thunderstruck (Live).mp4");
    assert_eq!(asset.path().parent(), Some(asset.dir()));
    drop(asset);

    // A long TikTok description would overflow the 255-byte name limit
    media.file_stem = "#fyp ".repeat(60);
    let asset = fetcher
        .fetch(&media, &ProgressReporter::detached())
        .await
        .expect("fetch with a long title failed");
    assert!(asset.file_name().len() <= 255);
    assert!(asset.file_name().ends_with(".mp4"));
    assert_eq!(asset.size(), 2048);
}

#[tokio::test]
async fn test_oversize_rejected_by_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 8192]))
        .mount(&server)
        .await;

    let downloads = TempDir::new().unwrap();
    let err = fetcher(downloads.path(), 1024, Duration::from_secs(10))
        .fetch(&direct(format!("{}/big.mp4", server.uri()), Vec::new()), &ProgressReporter::detached())
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::FileTooLarge { size: 8192, limit: 1024 }));
    assert_eq!(entries(downloads.path()), 0);
}

#[tokio::test]
async fn test_oversize_rejected_mid_stream() {
    let url = serve_chunked(16, 1024).await;

    let downloads = TempDir::new().unwrap();
    let err = fetcher(downloads.path(), 4096, Duration::from_secs(10))
        .fetch(&direct(url, Vec::new()), &ProgressReporter::detached())
        .await
        .unwrap_err();

    match err {
        DownloadError::FileTooLarge { size, limit } => {
            assert!(size > 4096);
            assert_eq!(limit, 4096);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(entries(downloads.path()), 0);
}

#[tokio::test]
async fn test_chunked_download_within_limit() {
    let url = serve_chunked(4, 1024).await;

    let downloads = TempDir::new().unwrap();
    let asset = fetcher(downloads.path(), 1024 * 1024, Duration::from_secs(10))
        .fetch(&direct(url, Vec::new()), &ProgressReporter::detached())
        .await
        .expect("fetch failed");
    assert_eq!(asset.size(), 4096);
}

#[tokio::test]
async fn test_not_found_and_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/empty.mp4"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let downloads = TempDir::new().unwrap();
    let fetcher = fetcher(downloads.path(), 1024, Duration::from_secs(10));

    let err = fetcher
        .fetch(&direct(format!("{}/missing.mp4", server.uri()), Vec::new()), &ProgressReporter::detached())
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::NotFound));

    let err = fetcher
        .fetch(&direct(format!("{}/empty.mp4", server.uri()), Vec::new()), &ProgressReporter::detached())
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::NoMedia));

    assert_eq!(entries(downloads.path()), 0);
}

#[tokio::test]
async fn test_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![1u8; 16])
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let downloads = TempDir::new().unwrap();
    let err = fetcher(downloads.path(), 1024, Duration::from_millis(200))
        .fetch(&direct(format!("{}/slow.mp4", server.uri()), Vec::new()), &ProgressReporter::detached())
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Timeout(_)));
    assert_eq!(entries(downloads.path()), 0);
}

#[tokio::test]
async fn test_sweep_stale_downloads() {
    let downloads = TempDir::new().unwrap();
    std::fs::create_dir(downloads.path().join("req-old1")).unwrap();
    std::fs::write(downloads.path().join("req-old1").join("a.mp4"), b"x").unwrap();
    std::fs::create_dir(downloads.path().join("req-old2")).unwrap();
    std::fs::write(downloads.path().join("keep.txt"), b"x").unwrap();

    let removed = sweep_stale_downloads(downloads.path()).await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(entries(downloads.path()), 1);
}
