use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    pub filename: String,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to access catalog file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("catalog file contains duplicate id {0}")]
    DuplicateId(String),
    #[error("catalog lock poisoned")]
    Poisoned,
}

#[derive(Default)]
struct Records {
    items: Vec<MediaItem>,
    index: HashMap<String, usize>,
}

impl Records {
    fn from_items(items: Vec<MediaItem>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(items.len());
        for (pos, item) in items.iter().enumerate() {
            if index.insert(item.id.clone(), pos).is_some() {
                return Err(CatalogError::DuplicateId(item.id.clone()));
            }
        }
        Ok(Self { items, index })
    }
}

/// Flat record store mapping video ids to stored filenames and titles.
///
/// Records are kept in creation order and indexed by id. Every `create`
/// rewrites the whole JSON file.
pub struct Catalog {
    path: PathBuf,
    records: RwLock<Records>,
    // Serializes record file writes; `records` is only write-locked for the
    // in-memory append once the file is on disk.
    writer: Mutex<()>,
}

impl Catalog {
    /// Loads the record file at `path`, or starts empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();

        let items: Vec<MediaItem> = match std::fs::read(&path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| CatalogError::Malformed {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(CatalogError::Io {
                    path: path.clone(),
                    source,
                })
            }
        };

        info!("Loaded {} catalog records from {}", items.len(), path.display());

        Ok(Self {
            records: RwLock::new(Records::from_items(items)?),
            writer: Mutex::new(()),
            path,
        })
    }

    pub fn lookup(&self, id: &str) -> Option<MediaItem> {
        let records = self.records.read().ok()?;
        records
            .index
            .get(id)
            .map(|&pos| records.items[pos].clone())
    }

    pub fn list(&self) -> Vec<MediaItem> {
        self.records
            .read()
            .map(|records| records.items.clone())
            .unwrap_or_default()
    }

    /// Adds a record with a freshly generated id and persists the catalog.
    ///
    /// Blocks on file I/O; async callers should run it on a blocking thread.
    pub fn create(&self, title: &str, filename: &str) -> Result<MediaItem, CatalogError> {
        let _writer = self.writer.lock().map_err(|_| CatalogError::Poisoned)?;

        let (id, mut items) = {
            let records = self.records.read().map_err(|_| CatalogError::Poisoned)?;
            let mut id = Uuid::new_v4().to_string();
            while records.index.contains_key(&id) {
                id = Uuid::new_v4().to_string();
            }
            (id, records.items.clone())
        };

        let item = MediaItem {
            id,
            title: title.to_string(),
            filename: filename.to_string(),
        };

        items.push(item.clone());
        persist(&self.path, &items)?;

        let mut records = self.records.write().map_err(|_| CatalogError::Poisoned)?;
        let pos = records.items.len();
        records.items.push(item.clone());
        records.index.insert(item.id.clone(), pos);

        info!("Created catalog record {} ({})", item.id, item.filename);
        Ok(item)
    }
}

fn persist(path: &Path, items: &[MediaItem]) -> Result<(), CatalogError> {
    let io_err = |source: std::io::Error| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_vec_pretty(items).map_err(|source| CatalogError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    // Readers never observe a partially written record file.
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_lookup_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("videos.json")).unwrap();

        let first = catalog.create("First", "first.mp4").unwrap();
        let second = catalog.create("Second", "second.mp4").unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(catalog.lookup(&first.id), Some(first.clone()));
        assert_eq!(catalog.list(), vec![first, second]);
        assert!(catalog.lookup("missing").is_none());
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("videos.json");

        let item = Catalog::open(&path)
            .unwrap()
            .create("Clip", "clip.mp4")
            .unwrap();

        let reopened = Catalog::open(&path).unwrap();
        assert_eq!(reopened.lookup(&item.id), Some(item));
    }

    #[test]
    fn existing_numeric_ids_are_opaque_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("videos.json");
        std::fs::write(
            &path,
            r#"[{"id":"1","title":"Video 1","filename":"video1.mkv"}]"#,
        )
        .unwrap();

        let catalog = Catalog::open(&path).unwrap();
        assert_eq!(catalog.lookup("1").unwrap().filename, "video1.mkv");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("videos.json");
        std::fs::write(
            &path,
            r#"[{"id":"a","title":"A","filename":"a.mp4"},{"id":"a","title":"B","filename":"b.mp4"}]"#,
        )
        .unwrap();

        assert!(matches!(
            Catalog::open(&path),
            Err(CatalogError::DuplicateId(id)) if id == "a"
        ));
    }

    #[test]
    fn lookups_do_not_wait_for_a_pending_write() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("videos.json")).unwrap();
        let item = catalog.create("Clip", "clip.mp4").unwrap();

        let _writer = catalog.writer.lock().unwrap();
        assert_eq!(catalog.lookup(&item.id), Some(item.clone()));
        assert_eq!(catalog.list(), vec![item]);
    }

    #[test]
    fn concurrent_creates_are_all_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("videos.json");
        let catalog = std::sync::Arc::new(Catalog::open(&path).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let catalog = catalog.clone();
                std::thread::spawn(move || {
                    catalog
                        .create(&format!("Clip {i}"), &format!("clip{i}.mp4"))
                        .unwrap()
                })
            })
            .collect();
        let created: Vec<MediaItem> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let reopened = Catalog::open(&path).unwrap();
        assert_eq!(reopened.list().len(), 8);
        assert_eq!(reopened.list(), catalog.list());
        for item in created {
            assert_eq!(reopened.lookup(&item.id), Some(item));
        }
    }
}
