// The `file` module provides a cache that survives process restarts.

use super::{Cache, CacheKey};
use crate::llm::Generation;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// The `CacheError` enum defines the errors that can occur while opening a [`FileCache`].
#[derive(Error, Debug)]
pub enum CacheError {
    /// The cache file could not be read.
    #[error("failed to read cache file: {0}")]
    Io(#[from] std::io::Error),
    /// The cache file does not contain a valid cache document.
    #[error("failed to parse cache file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A cache mirrored to a JSON file.
///
/// Entries are served from memory. Every update rewrites the file, so a cache
/// reopened from the same path starts with everything stored before.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    entries: RwLock<HashMap<CacheKey, Vec<Generation>>>,
}

impl FileCache {
    /// Opens the cache at `path`, loading its entries if the file exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => HashMap::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = entries.len(), "Opened file cache");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn persist(&self, entries: &HashMap<CacheKey, Vec<Generation>>) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let raw = serde_json::to_string(entries)?;
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, raw).await?;
        fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Cache for FileCache {
    async fn lookup(&self, key: &CacheKey) -> Option<Vec<Generation>> {
        self.entries.read().await.get(key).cloned()
    }

    async fn update(&self, key: CacheKey, value: Vec<Generation>) {
        // Hold the write lock across the flush so concurrent updates hit the
        // disk in the same order they hit the map.
        let mut entries = self.entries.write().await;
        entries.insert(key, value);
        if let Err(e) = self.persist(&entries).await {
            warn!(path = %self.path.display(), error = %e, "Failed to persist cache update");
        }
    }
}
