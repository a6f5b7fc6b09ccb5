//! Homebrew formulae and casks.

use super::{ensure_not_cancelled, package_installation, run_tool, tolerate, DetectionStrategy};
use crate::detection::{brew_package_from_command, BrewPackage};
use crate::{AgentDef, DetectionError, Host, InstallMethod, InstallMethodDef, Installation, Platform, Version};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const BREW: &str = "brew";

pub(crate) const METADATA_CASK: &str = "cask";
pub(crate) const METADATA_TAP: &str = "tap";

/// Shape of `brew info --json=v2`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct BrewInfo {
    #[serde(default)]
    formulae: Vec<BrewFormula>,
    #[serde(default)]
    casks: Vec<BrewCask>,
}

#[derive(Debug, Default, Deserialize)]
struct BrewFormula {
    #[serde(default)]
    tap: Option<String>,
    #[serde(default)]
    versions: BrewVersions,
    #[serde(default)]
    installed: Vec<BrewInstalled>,
}

#[derive(Debug, Default, Deserialize)]
struct BrewVersions {
    #[serde(default)]
    stable: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BrewInstalled {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BrewCask {
    #[serde(default)]
    tap: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    installed: Option<String>,
}

impl BrewInfo {
    pub(crate) fn parse(json: &str) -> Result<Self, DetectionError> {
        serde_json::from_str(json).map_err(|e| DetectionError::Parse {
            source_name: "brew info".to_string(),
            message: e.to_string(),
        })
    }

    /// Installed version, `None` when the package is not installed.
    ///
    /// An installed entry without a readable version yields
    /// [`Version::unknown`].
    pub(crate) fn installed_version(&self, cask: bool) -> Option<Version> {
        let raw = if cask {
            self.casks.first()?.installed.as_deref()?
        } else {
            let installed = self.formulae.first()?.installed.first()?;
            match installed.version.as_deref() {
                Some(version) => version,
                None => return Some(Version::unknown()),
            }
        };
        Some(Version::parse(raw))
    }

    /// Newest version the tap offers.
    pub(crate) fn available_version(&self, cask: bool) -> Option<Version> {
        let raw = if cask {
            self.casks.first()?.version.as_deref()?
        } else {
            self.formulae.first()?.versions.stable.as_deref()?
        };
        Some(Version::parse(raw))
    }

    pub(crate) fn tap(&self, cask: bool) -> Option<&str> {
        if cask {
            self.casks.first()?.tap.as_deref()
        } else {
            self.formulae.first()?.tap.as_deref()
        }
    }
}

/// The Homebrew package a catalog method refers to.
///
/// A declared package is used as-is; `metadata.cask` marks it as a cask.
/// Otherwise the install command is parsed.
pub(crate) fn brew_package(method: &InstallMethodDef) -> Option<BrewPackage> {
    let declared_cask = method.metadata_flag(METADATA_CASK);
    match method.declared_package() {
        Some(package) => BrewPackage::from_name(package, declared_cask),
        None => brew_package_from_command(&method.command).map(|mut package| {
            package.cask |= declared_cask;
            package
        }),
    }
}

/// Arguments for `brew info --json=v2 [--cask] <name>`.
pub(crate) fn info_args(package: &BrewPackage) -> Vec<&str> {
    let mut args = vec!["info", "--json=v2"];
    if package.cask {
        args.push("--cask");
    }
    args.push(&package.name);
    args
}

/// Query `brew info` for one package. Failures other than cancellation
/// yield `None`.
pub(crate) async fn brew_info(
    host: &dyn Host,
    cancel: &CancellationToken,
    brew: &Path,
    package: &BrewPackage,
) -> Result<Option<BrewInfo>, DetectionError> {
    let output = run_tool(host, cancel, brew, &info_args(package))
        .await
        .and_then(|output| output.require_success("brew info"));
    let Some(output) = tolerate(output, &package.name)? else {
        return Ok(None);
    };
    tolerate(BrewInfo::parse(&output.stdout), &package.name)
}

/// Finds agents installed with `brew install` (formula or cask).
pub struct BrewStrategy {
    host: Arc<dyn Host>,
}

impl BrewStrategy {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl DetectionStrategy for BrewStrategy {
    fn name(&self) -> &str {
        BREW
    }

    fn method(&self) -> InstallMethod {
        InstallMethod::Brew
    }

    fn is_applicable(&self, platform: Platform) -> bool {
        !platform.is_windows() && self.host.find_executable(BREW).is_some()
    }

    async fn detect(
        &self,
        cancel: &CancellationToken,
        agents: &[AgentDef],
    ) -> Result<Vec<Installation>, DetectionError> {
        ensure_not_cancelled(cancel)?;
        let platform = self.host.platform();
        let Some(brew) = self.host.find_executable(BREW) else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        for agent in agents {
            let Some(package) = agent.method_for(BREW, platform).and_then(brew_package) else {
                continue;
            };
            let Some(info) = brew_info(self.host.as_ref(), cancel, &brew, &package).await? else {
                continue;
            };
            let Some(version) = info.installed_version(package.cask) else {
                tracing::debug!(agent = %agent.id, package = %package.name, "brew package not installed");
                continue;
            };

            let mut installation = package_installation(
                self.host.as_ref(),
                agent,
                self.name(),
                InstallMethod::Brew,
                &package.name,
                version,
            )
            .with_metadata(METADATA_CASK, package.cask.to_string());
            if let Some(tap) = info.tap(package.cask).or(package.tap.as_deref()) {
                installation = installation.with_metadata(METADATA_TAP, tap);
            }
            found.push(installation);
        }
        Ok(found)
    }
}
