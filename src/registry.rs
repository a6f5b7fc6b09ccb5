//! Latest-version lookups for update checks.

use crate::strategy::{brew_info, brew_package, npm_package, run_tool};
use crate::{AgentDef, Host, InstallMethod, Installation, Version};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Something that knows the newest published version of an agent.
#[async_trait]
pub trait LatestVersionSource: Send + Sync {
    /// Newest version available through `installation`'s method, or `None`
    /// when it cannot be determined.
    async fn latest_version(
        &self,
        cancel: &CancellationToken,
        agent: &AgentDef,
        installation: &Installation,
    ) -> Option<Version>;
}

/// Asks the package managers themselves.
///
/// npm installs use `npm view <package> version`; Homebrew installs use
/// `brew info --json=v2` (the formula's stable version or the cask version).
/// Other methods have no registry to ask and report `None`.
pub struct PackageRegistry {
    host: Arc<dyn Host>,
}

impl PackageRegistry {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self { host }
    }

    async fn npm_latest(
        &self,
        cancel: &CancellationToken,
        agent: &AgentDef,
        installation: &Installation,
    ) -> Option<Version> {
        let package = installation
            .metadata
            .get(crate::strategy::METADATA_PACKAGE)
            .cloned()
            .or_else(|| npm_package(agent, self.host.platform()))?;
        let npm = self.host.find_executable("npm")?;
        let args = ["view", package.as_str(), "version"];
        let output = run_tool(self.host.as_ref(), cancel, &npm, &args)
            .await
            .and_then(|output| output.require_success("npm view"));
        match output {
            Ok(output) => {
                let raw = output.stdout.trim();
                (!raw.is_empty()).then(|| Version::parse(raw))
            }
            Err(e) => {
                tracing::debug!(package = %package, error = %e, "npm view failed");
                None
            }
        }
    }

    async fn brew_latest(&self, cancel: &CancellationToken, agent: &AgentDef) -> Option<Version> {
        let package = agent
            .method_for("brew", self.host.platform())
            .and_then(brew_package)?;
        let brew = self.host.find_executable("brew")?;
        match brew_info(self.host.as_ref(), cancel, &brew, &package).await {
            Ok(info) => info?.available_version(package.cask),
            Err(_) => None,
        }
    }
}

#[async_trait]
impl LatestVersionSource for PackageRegistry {
    async fn latest_version(
        &self,
        cancel: &CancellationToken,
        agent: &AgentDef,
        installation: &Installation,
    ) -> Option<Version> {
        match installation.method {
            InstallMethod::Npm => self.npm_latest(cancel, agent, installation).await,
            InstallMethod::Brew => self.brew_latest(cancel, agent).await,
            _ => None,
        }
    }
}

/// Copies of `installations` with `latest_version` filled in from `source`.
///
/// Lookups run concurrently. Installations whose agent is not in `agents`
/// keep their current latest version.
pub async fn apply_latest_versions(
    installations: &[Installation],
    agents: &[AgentDef],
    source: &dyn LatestVersionSource,
    cancel: &CancellationToken,
) -> Vec<Installation> {
    let lookups = installations.iter().map(|installation| async move {
        let Some(agent) = agents.iter().find(|agent| agent.id == installation.agent_id) else {
            return installation.clone();
        };
        let latest = source.latest_version(cancel, agent, installation).await;
        installation.with_latest_version(latest)
    });
    join_all(lookups).await
}
