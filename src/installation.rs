//! Detected installation records.

use crate::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// How an agent was installed.
///
/// The string form (`npm`, `pipx`, `native`, ...) matches the install-method
/// keys used in the catalog.
///
/// # Example
///
/// ```rust
/// use agent_inventory::InstallMethod;
///
/// let method: InstallMethod = "pipx".parse().unwrap();
/// assert_eq!(method, InstallMethod::Pipx);
/// assert_eq!(InstallMethod::Chocolatey.to_string(), "chocolatey");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[non_exhaustive]
pub enum InstallMethod {
    Npm,
    Pip,
    Pipx,
    Uv,
    Brew,
    Native,
    Curl,
    Binary,
    Scoop,
    Winget,
    #[serde(alias = "choco")]
    #[strum(to_string = "chocolatey", serialize = "choco")]
    Chocolatey,
}

/// Identity of an installation: agent + method + executable path.
///
/// Two records with the same key describe the same installation seen twice;
/// the same agent installed via two methods has two keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstallationKey {
    pub agent_id: String,
    pub method: InstallMethod,
    pub executable_path: PathBuf,
}

impl fmt::Display for InstallationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.agent_id,
            self.method,
            self.executable_path.display()
        )
    }
}

/// One detected instance of an agent on this machine.
///
/// Installations are created by a strategy during a detection pass and are
/// never patched afterwards; [`Installation::with_latest_version`] returns a
/// new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    /// Catalog id of the agent.
    pub agent_id: String,

    /// Display name of the agent.
    pub agent_name: String,

    pub method: InstallMethod,

    pub installed_version: Version,

    /// Newest available version; `None` means unknown.
    pub latest_version: Option<Version>,

    /// Path to the executable. Empty when the package is installed but none
    /// of the declared executables could be found.
    pub executable_path: PathBuf,

    /// Where the package's files live, when the package manager says.
    pub install_path: Option<PathBuf>,

    pub is_global: bool,

    /// When this record was produced.
    pub detected_at: SystemTime,

    /// Strategy-specific details (matched executable, package name, ...).
    pub metadata: BTreeMap<String, String>,
}

impl Installation {
    /// A record stamped with the current time and no optional data.
    pub fn new(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        method: InstallMethod,
        installed_version: Version,
        executable_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            method,
            installed_version,
            latest_version: None,
            executable_path: executable_path.into(),
            install_path: None,
            is_global: true,
            detected_at: SystemTime::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_install_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.install_path = Some(path.into());
        self
    }

    pub fn with_global(mut self, is_global: bool) -> Self {
        self.is_global = is_global;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// A copy of this record carrying `latest` as the newest known version.
    pub fn with_latest_version(&self, latest: Option<Version>) -> Self {
        Self {
            latest_version: latest,
            ..self.clone()
        }
    }

    /// The identity key (agent id + method + executable path).
    pub fn key(&self) -> InstallationKey {
        InstallationKey {
            agent_id: self.agent_id.clone(),
            method: self.method,
            executable_path: self.executable_path.clone(),
        }
    }

    /// True iff a latest version is known and strictly newer than the installed one.
    ///
    /// # Example
    ///
    /// ```rust
    /// use agent_inventory::{Installation, InstallMethod, Version};
    ///
    /// let install = Installation::new("aider", "Aider", InstallMethod::Pipx, Version::parse("1.0.0"), "/bin/aider");
    /// assert!(!install.has_update());
    /// assert!(install.with_latest_version(Some(Version::parse("1.1.0"))).has_update());
    /// ```
    pub fn has_update(&self) -> bool {
        self.latest_version
            .as_ref()
            .is_some_and(|latest| latest.is_newer_than(&self.installed_version))
    }

    pub fn executable_path(&self) -> Option<&Path> {
        if self.executable_path.as_os_str().is_empty() {
            None
        } else {
            Some(&self.executable_path)
        }
    }
}
