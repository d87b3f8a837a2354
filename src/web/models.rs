use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::{Catalog, MediaItem};
use crate::config::Config;
use crate::thumbnails::{FrameExtractor, ThumbnailCache};

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub thumbnails: ThumbnailCache,
    pub videos_dir: PathBuf,
    pub content_type: String,
    pub chunk_size: usize,
}

impl AppState {
    pub fn new(config: &Config, catalog: Arc<Catalog>, extractor: Arc<dyn FrameExtractor>) -> Self {
        Self {
            catalog,
            thumbnails: ThumbnailCache::new(config.thumbs_path(), extractor),
            videos_dir: config.videos_path(),
            content_type: config.content_type.clone(),
            chunk_size: config.stream_chunk_size,
        }
    }

    /// Location of the item's file in media storage. Filenames that would
    /// escape the storage directory resolve to nothing.
    pub fn video_path(&self, item: &MediaItem) -> Option<PathBuf> {
        let name = Path::new(&item.filename).file_name()?;
        (name == item.filename.as_str()).then(|| self.videos_dir.join(name))
    }

    /// `(id, source path)` pairs for every catalog entry, for thumbnail prewarming.
    pub fn thumbnail_sources(&self) -> Vec<(String, PathBuf)> {
        self.catalog
            .list()
            .into_iter()
            .filter_map(|item| {
                let path = self.video_path(&item)?;
                Some((item.id, path))
            })
            .collect()
    }
}
