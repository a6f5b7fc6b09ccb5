//! Detection options configuration.
//!
//! This module provides the [`DetectOptions`] struct for configuring
//! detection behavior: subprocess and overall timeouts, the cache TTL used
//! by [`Inventory`](crate::Inventory), and the path patterns the binary
//! strategy treats as package-manager territory.

use crate::detection::DEFAULT_MANAGED_PATH_PATTERNS;
use std::time::Duration;

/// Configuration options for agent detection.
///
/// # Default Behavior
///
/// Each subprocess (version probe, `npm list`, `brew info`, ...) gets 5
/// seconds; a whole detection run gets 120 seconds; cached inventories are
/// trusted for one hour.
///
/// # Example
///
/// ```rust
/// use agent_inventory::DetectOptions;
/// use std::time::Duration;
///
/// let opts = DetectOptions {
///     command_timeout: Duration::from_secs(10),
///     ..Default::default()
/// };
/// assert_eq!(opts.cache_ttl, Duration::from_secs(3600));
///
/// // Treat an in-house tool directory as managed too
/// let opts = DetectOptions::default().with_managed_path_pattern("/opt/corp-tools/");
/// assert!(opts.managed_path_patterns.iter().any(|p| p == "node_modules"));
/// ```
#[derive(Debug, Clone)]
pub struct DetectOptions {
    /// Timeout for each subprocess.
    ///
    /// Default: 5 seconds
    pub command_timeout: Duration,

    /// Budget for a whole detection run made by
    /// [`Inventory::installations`](crate::Inventory::installations).
    ///
    /// Default: 120 seconds
    pub detection_timeout: Duration,

    /// How long a cached inventory is considered fresh.
    ///
    /// Default: 1 hour
    pub cache_ttl: Duration,

    /// Path fragments marking an executable as owned by a package manager.
    ///
    /// Default: [`DEFAULT_MANAGED_PATH_PATTERNS`]
    pub managed_path_patterns: Vec<String>,
}

impl DetectOptions {
    /// Add a managed-path pattern on top of the current list.
    pub fn with_managed_path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.managed_path_patterns.push(pattern.into());
        self
    }
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(5),
            detection_timeout: Duration::from_secs(120),
            cache_ttl: Duration::from_secs(60 * 60),
            managed_path_patterns: DEFAULT_MANAGED_PATH_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}
