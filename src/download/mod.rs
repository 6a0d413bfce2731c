//! Transient media store: yt-dlp runner, HTTP fetcher and downloaded assets.

mod asset;
mod fetch;
mod rate_limiter;
pub mod ytdlp;

pub use asset::{sweep_stale_downloads, DownloadedAsset};
pub use fetch::Fetcher;
pub use rate_limiter::{PlatformLimiter, PlatformPermit};
pub use ytdlp::{MediaInfo, YtDlp};
