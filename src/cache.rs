//! Storage for the last detection result.
//!
//! The [`Detector`](crate::Detector) itself never reads or writes a cache;
//! [`Inventory`](crate::Inventory) decides when a stored snapshot is still
//! good enough.

use crate::{CacheError, Installation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

/// The installations found by one detection run, and when it ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub installations: Vec<Installation>,
    /// `UNIX_EPOCH` when nothing has been stored yet.
    pub detected_at: SystemTime,
}

impl CacheSnapshot {
    pub fn new(installations: Vec<Installation>, detected_at: SystemTime) -> Self {
        Self {
            installations,
            detected_at,
        }
    }

    /// No installations, zero time.
    pub fn empty() -> Self {
        Self::new(Vec::new(), SystemTime::UNIX_EPOCH)
    }

    /// Whether this snapshot came from an actual detection run.
    pub fn is_empty(&self) -> bool {
        self.detected_at == SystemTime::UNIX_EPOCH
    }

    /// Whether the snapshot is younger than `ttl` at `now`.
    ///
    /// The empty snapshot is never fresh, nor is one stamped in the future
    /// (the clock moved backwards since it was written).
    pub fn is_fresh(&self, ttl: Duration, now: SystemTime) -> bool {
        if self.is_empty() {
            return false;
        }
        now.duration_since(self.detected_at)
            .map(|age| age < ttl)
            .unwrap_or(false)
    }
}

impl Default for CacheSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Where detection results are kept between runs.
///
/// A read returns either a complete snapshot or [`CacheSnapshot::empty`],
/// never partial data. A save replaces the previous snapshot wholesale.
#[async_trait]
pub trait DetectionCache: Send + Sync {
    async fn get_detection_cache(&self) -> Result<CacheSnapshot, CacheError>;

    /// Store `installations` stamped with the current time.
    async fn save_detection_cache(&self, installations: &[Installation]) -> Result<(), CacheError>;
}

/// Process-local cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    snapshot: RwLock<Option<CacheSnapshot>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache pre-loaded with `snapshot`.
    pub fn with_snapshot(snapshot: CacheSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl DetectionCache for MemoryCache {
    async fn get_detection_cache(&self) -> Result<CacheSnapshot, CacheError> {
        Ok(self.snapshot.read().await.clone().unwrap_or_default())
    }

    async fn save_detection_cache(&self, installations: &[Installation]) -> Result<(), CacheError> {
        let snapshot = CacheSnapshot::new(installations.to_vec(), SystemTime::now());
        *self.snapshot.write().await = Some(snapshot);
        Ok(())
    }
}

/// Cache persisted as a JSON file.
///
/// Saves write a sibling temporary file and rename it over the target, so a
/// concurrent reader sees either the old or the new snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        // One temp file per save.
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        name.push(format!(".{}.{seq}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl DetectionCache for JsonFileCache {
    async fn get_detection_cache(&self) -> Result<CacheSnapshot, CacheError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CacheSnapshot::empty());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    async fn save_detection_cache(&self, installations: &[Installation]) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let snapshot = CacheSnapshot::new(installations.to_vec(), SystemTime::now());
        let json = serde_json::to_string_pretty(&snapshot)?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await?;
        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        tracing::debug!(path = %self.path.display(), installations = installations.len(), "saved detection cache");
        Ok(())
    }
}
