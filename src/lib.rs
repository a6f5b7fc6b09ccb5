//! # agent-inventory
//!
//! Detection and version reconciliation for AI development CLI agents
//! (Claude Code, Codex, Gemini CLI, Aider, Goose, ...).
//!
//! Given a catalog of agent definitions, this crate finds out which agents
//! are installed, through which install method (npm, pip/pipx/uv, Homebrew,
//! native binary), at which version, and whether a newer version exists.
//!
//! ## Features
//!
//! - `Detector` runs detection strategies concurrently and merges their
//!   results into one deduplicated list
//! - Four built-in strategies: `BinaryStrategy`, `NpmStrategy`,
//!   `PipStrategy`, `BrewStrategy`
//! - `Version` parsing and comparison that tolerates non-semver output
//! - `DetectionCache` contract with in-memory and JSON-file implementations,
//!   and `Inventory` to serve cached results within a TTL
//! - `PackageRegistry` for latest-version lookups
//!
//! All subprocesses go through a [`Host`], honour a [`CancellationToken`]
//! and are killed on cancellation or timeout.
//!
//! ## Example
//!
//! ```rust,no_run
//! use agent_inventory::{
//!     apply_latest_versions, parse_catalog, CancellationToken, DetectOptions, Detector,
//!     PackageRegistry, SystemHost,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let agents = parse_catalog(&std::fs::read_to_string("catalog.json").unwrap()).unwrap();
//!
//!     let options = DetectOptions::default();
//!     let host = Arc::new(SystemHost::new(options.command_timeout));
//!     let detector = Detector::with_default_strategies(host.clone(), &options);
//!
//!     let cancel = CancellationToken::new();
//!     let found = detector.detect_all(&cancel, &agents).await.unwrap();
//!     let found = apply_latest_versions(&found, &agents, &PackageRegistry::new(host), &cancel).await;
//!
//!     for install in &found {
//!         println!(
//!             "{} {} ({}) update available: {}",
//!             install.agent_name,
//!             install.installed_version,
//!             install.method,
//!             install.has_update()
//!         );
//!     }
//! }
//! ```

mod cache;
mod catalog;
mod detect;
mod detection;
mod errors;
mod host;
mod installation;
mod inventory;
mod options;
mod platform;
mod registry;
mod strategy;
mod version;

pub use cache::{CacheSnapshot, DetectionCache, JsonFileCache, MemoryCache};
pub use catalog::{parse_catalog, AgentDef, DetectionDef, InstallMethodDef};
pub use detect::Detector;
pub use detection::{is_managed_path, DEFAULT_MANAGED_PATH_PATTERNS};
pub use errors::{CacheError, DetectionError};
pub use host::{CommandOutput, Host, SystemHost};
pub use installation::{InstallMethod, Installation, InstallationKey};
pub use inventory::{Inventory, InventoryView};
pub use options::DetectOptions;
pub use platform::Platform;
pub use registry::{apply_latest_versions, LatestVersionSource, PackageRegistry};
pub use strategy::{BinaryStrategy, BrewStrategy, DetectionStrategy, NpmStrategy, PipStrategy};
pub use tokio_util::sync::CancellationToken;
pub use version::Version;
