//! Cached access to the installation inventory.

use crate::{AgentDef, CacheSnapshot, DetectOptions, DetectionCache, DetectionError, Detector, Installation};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

/// The inventory handed to callers, with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryView {
    pub installations: Vec<Installation>,
    /// When the underlying detection ran.
    pub detected_at: SystemTime,
    /// Served from the cache without running detection.
    pub from_cache: bool,
    /// Served from an expired cache entry because detection failed.
    pub stale: bool,
}

impl InventoryView {
    fn cached(snapshot: CacheSnapshot, stale: bool) -> Self {
        Self {
            installations: snapshot.installations,
            detected_at: snapshot.detected_at,
            from_cache: true,
            stale,
        }
    }

    fn detected(installations: Vec<Installation>, detected_at: SystemTime) -> Self {
        Self {
            installations,
            detected_at,
            from_cache: false,
            stale: false,
        }
    }

    /// Installations for one agent.
    pub fn for_agent<'a>(&'a self, agent_id: &'a str) -> impl Iterator<Item = &'a Installation> + 'a {
        self.installations
            .iter()
            .filter(move |installation| installation.agent_id == agent_id)
    }
}

/// Detector plus cache: the entry point for "what is installed right now".
///
/// A fresh cached snapshot (younger than [`DetectOptions::cache_ttl`]) is
/// returned without scanning. Otherwise a detection runs, bounded by
/// [`DetectOptions::detection_timeout`], and its result replaces the cache.
/// A run cut short by cancellation or the budget is returned to the caller
/// but not cached. The cache is an optimization only; its failures are
/// logged and never stop a detection.
///
/// # Example
///
/// ```rust,no_run
/// use agent_inventory::{DetectOptions, Detector, Inventory, JsonFileCache, SystemHost};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let options = DetectOptions::default();
///     let host = Arc::new(SystemHost::new(options.command_timeout));
///     let inventory = Inventory::new(
///         Detector::with_default_strategies(host, &options),
///         Arc::new(JsonFileCache::new("/tmp/agent-inventory.json")),
///         options,
///     );
///
///     let view = inventory
///         .installations(&CancellationToken::new(), &[], false)
///         .await
///         .unwrap();
///     println!("{} installations (cached: {})", view.installations.len(), view.from_cache);
/// }
/// ```
pub struct Inventory {
    detector: Detector,
    cache: Arc<dyn DetectionCache>,
    options: DetectOptions,
}

impl Inventory {
    pub fn new(detector: Detector, cache: Arc<dyn DetectionCache>, options: DetectOptions) -> Self {
        Self {
            detector,
            cache,
            options,
        }
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn cache_ttl(&self) -> Duration {
        self.options.cache_ttl
    }

    /// The current inventory for `agents`.
    ///
    /// With `refresh` set the cache is bypassed and detection always runs.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::Cancelled`] when detection could not start
    /// and the cache holds nothing to fall back on.
    pub async fn installations(
        &self,
        cancel: &CancellationToken,
        agents: &[AgentDef],
        refresh: bool,
    ) -> Result<InventoryView, DetectionError> {
        let cached = self.read_cache().await;

        if !refresh && cached.is_fresh(self.options.cache_ttl, SystemTime::now()) {
            tracing::debug!(installations = cached.installations.len(), "serving cached inventory");
            return Ok(InventoryView::cached(cached, false));
        }

        let detected_at = SystemTime::now();
        let detection = self
            .detector
            .detect_bounded(cancel, agents, self.options.detection_timeout)
            .await;
        let (installations, complete) = match detection {
            Ok(found) => found,
            Err(e) if !cached.is_empty() => {
                tracing::warn!(error = %e, "detection failed, serving stale inventory");
                return Ok(InventoryView::cached(cached, true));
            }
            Err(e) => return Err(e),
        };

        if !complete {
            tracing::debug!(installations = installations.len(), "partial detection, cache left as is");
        } else if let Err(e) = self.cache.save_detection_cache(&installations).await {
            tracing::warn!(error = %e, "failed to save detection cache");
        }
        Ok(InventoryView::detected(installations, detected_at))
    }

    async fn read_cache(&self) -> CacheSnapshot {
        match self.cache.get_detection_cache().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read detection cache");
                CacheSnapshot::empty()
            }
        }
    }
}
