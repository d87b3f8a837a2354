use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

use crate::thumbnails::extractor::FrameExtractor;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ThumbnailError {
    #[error("video id {0:?} cannot be used as a thumbnail name")]
    InvalidId(String),
    #[error("thumbnail generation failed: {0}")]
    Generation(String),
}

type Outcome = Result<PathBuf, ThumbnailError>;
type Ticket = watch::Receiver<Option<Outcome>>;

/// On-disk preview cache keyed by video id.
///
/// A missing thumbnail is generated at most once at a time per id: concurrent
/// callers subscribe to the in-flight generation and all see its outcome.
/// Finished thumbnails are never regenerated or expired.
#[derive(Clone)]
pub struct ThumbnailCache {
    dir: PathBuf,
    extractor: Arc<dyn FrameExtractor>,
    in_flight: Arc<Mutex<HashMap<String, Ticket>>>,
}

impl ThumbnailCache {
    pub fn new(dir: impl Into<PathBuf>, extractor: Arc<dyn FrameExtractor>) -> Self {
        Self {
            dir: dir.into(),
            extractor,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn thumbnail_path(&self, video_id: &str) -> Result<PathBuf, ThumbnailError> {
        if !is_path_safe(video_id) {
            return Err(ThumbnailError::InvalidId(video_id.to_string()));
        }
        Ok(self.dir.join(format!("{}.jpg", video_id)))
    }

    /// Returns the thumbnail for `video_id`, generating it from `source` if needed.
    pub async fn get_or_create(&self, video_id: &str, source: &Path) -> Outcome {
        let thumb_path = self.thumbnail_path(video_id)?;

        if exists(&thumb_path).await {
            return Ok(thumb_path);
        }

        let mut ticket = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(video_id) {
                Some(ticket) => {
                    debug!("Waiting for in-flight thumbnail generation for {}", video_id);
                    ticket.clone()
                }
                None => {
                    // A generation may have finished since the check above.
                    if exists(&thumb_path).await {
                        return Ok(thumb_path);
                    }
                    let (tx, rx) = watch::channel(None);
                    in_flight.insert(video_id.to_string(), rx.clone());
                    self.spawn_generation(video_id.to_string(), source.to_path_buf(), tx);
                    rx
                }
            }
        };

        let outcome = match ticket.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| {
            Err(ThumbnailError::Generation(
                "generation task ended without a result".to_string(),
            ))
        })
    }

    /// Generates missing thumbnails for `videos` one after another in the background.
    pub fn prewarm(&self, videos: Vec<(String, PathBuf)>) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            for (id, source) in videos {
                if let Err(e) = cache.get_or_create(&id, &source).await {
                    error!("Failed to prewarm thumbnail for {}: {}", id, e);
                }
            }
        })
    }

    // Generation is id-scoped: it keeps running when the requester that
    // started it goes away. It runs in its own inner task so a panicking
    // extractor still clears the ticket.
    fn spawn_generation(&self, video_id: String, source: PathBuf, tx: watch::Sender<Option<Outcome>>) {
        let cache = self.clone();
        tokio::spawn(async move {
            info!("Generating thumbnail for video: {}", video_id);
            let task = {
                let cache = cache.clone();
                let video_id = video_id.clone();
                tokio::spawn(async move { cache.generate(&video_id, &source).await })
            };

            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let _ = fs::remove_file(cache.partial_path(&video_id)).await;
                    Err(ThumbnailError::Generation(format!("generation task failed: {}", e)))
                }
            };

            match &outcome {
                Ok(path) => info!("Thumbnail ready for {}: {}", video_id, path.display()),
                Err(e) => error!("Failed to generate thumbnail for {}: {}", video_id, e),
            }

            // Clear the ticket and publish under the lock so a later caller
            // either sees the finished file or starts a fresh attempt.
            let mut in_flight = cache.in_flight.lock().await;
            in_flight.remove(&video_id);
            let _ = tx.send(Some(outcome));
        });
    }

    // Ids never start with '.', so this cannot name another id's thumbnail.
    fn partial_path(&self, video_id: &str) -> PathBuf {
        self.dir.join(format!(".{}.part.jpg", video_id))
    }

    async fn generate(&self, video_id: &str, source: &Path) -> Outcome {
        let thumb_path = self.thumbnail_path(video_id)?;
        let partial_path = self.partial_path(video_id);

        fs::create_dir_all(&self.dir).await.map_err(|e| {
            ThumbnailError::Generation(format!(
                "failed to create thumbs directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        if let Err(e) = self.extractor.generate_preview(source, &partial_path).await {
            let _ = fs::remove_file(&partial_path).await;
            return Err(ThumbnailError::Generation(e.to_string()));
        }

        match fs::rename(&partial_path, &thumb_path).await {
            Ok(()) => Ok(thumb_path),
            Err(e) => {
                let _ = fs::remove_file(&partial_path).await;
                Err(ThumbnailError::Generation(format!(
                    "no thumbnail produced at {}: {}",
                    partial_path.display(),
                    e
                )))
            }
        }
    }
}

fn is_path_safe(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}
