//! Platform extractors: shared URL in, media stream reference out.

mod caption;
mod context;
mod registry;
mod traits;
mod ytdlp_media;

pub mod instagram;
pub mod pinterest;
pub mod tiktok;
pub mod yandex;
pub mod youtube;

pub use caption::{format_count, html_escape, sanitize_file_stem};
pub use context::ExtractContext;
pub use registry::ExtractorRegistry;
pub use traits::{
    Extractor, FormatChoice, MediaFormat, MediaKind, MediaSource, Platform, ResolvedMedia,
};
