pub mod cache;
pub mod extractor;

pub use cache::{ThumbnailCache, ThumbnailError};
pub use extractor::{ExtractError, FfmpegExtractor, FrameExtractor};
