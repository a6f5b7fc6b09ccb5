//! Catalog input: the agents the engine knows how to look for.
//!
//! Agent definitions come from an external catalog (usually a JSON document)
//! and are consumed read-only by the strategies.

use crate::Platform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How one install method is declared for an agent.
///
/// # Example
///
/// ```rust
/// use agent_inventory::{InstallMethodDef, Platform};
///
/// let npm = InstallMethodDef {
///     package: Some("@anthropic-ai/claude-code".to_string()),
///     command: "npm install -g @anthropic-ai/claude-code".to_string(),
///     ..Default::default()
/// };
/// assert!(npm.supports(Platform::Windows));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallMethodDef {
    /// Package name for package-manager methods.
    pub package: Option<String>,

    /// Install command, also used to recover the package name.
    pub command: String,

    pub update_command: Option<String>,

    pub uninstall_command: Option<String>,

    /// Platforms this method works on; empty means all.
    pub platforms: Vec<Platform>,

    /// Free-form method metadata (e.g. `cask = "true"` for Homebrew).
    pub metadata: BTreeMap<String, String>,
}

impl InstallMethodDef {
    /// Whether this method is usable on `platform`.
    pub fn supports(&self, platform: Platform) -> bool {
        self.platforms.is_empty() || self.platforms.contains(&platform)
    }

    /// The declared package name, if non-empty.
    pub fn declared_package(&self) -> Option<&str> {
        self.package
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Whether metadata marks this as a flag set to true (`"true"`, `"1"`, `"yes"`).
    pub fn metadata_flag(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false)
    }
}

/// How to find an agent's executable and ask it for its version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionDef {
    /// Candidate executable names, in priority order.
    pub executables: Vec<String>,

    /// Version probe, e.g. `claude --version`. The first token is replaced by
    /// the resolved executable path. Empty means `--version`.
    pub version_command: String,

    /// Optional regex extracting the version from the probe output.
    pub version_regex: Option<String>,
}

/// One agent from the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDef {
    /// Stable identifier (e.g. `claude-code`).
    pub id: String,

    /// Display name (e.g. `Claude Code`).
    pub name: String,

    pub description: String,

    /// Install-method name (`npm`, `pipx`, `native`, ...) to its definition.
    pub install_methods: BTreeMap<String, InstallMethodDef>,

    pub detection: DetectionDef,
}

impl AgentDef {
    /// The named install method, if declared and supported on `platform`.
    pub fn method_for(&self, name: &str, platform: Platform) -> Option<&InstallMethodDef> {
        self.install_methods
            .get(name)
            .filter(|method| method.supports(platform))
    }

    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    Wrapped { agents: Vec<AgentDef> },
    Bare(Vec<AgentDef>),
}

/// Parse a catalog JSON document.
///
/// Accepts either a bare array of agents or an object with an `agents` array.
pub fn parse_catalog(json: &str) -> Result<Vec<AgentDef>, serde_json::Error> {
    let agents = match serde_json::from_str::<CatalogDocument>(json)? {
        CatalogDocument::Wrapped { agents } => agents,
        CatalogDocument::Bare(agents) => agents,
    };
    Ok(agents)
}
