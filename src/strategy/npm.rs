//! Globally installed npm packages.

use super::{ensure_not_cancelled, package_installation, run_tool, tolerate, DetectionStrategy};
use crate::detection::npm_package_from_command;
use crate::{AgentDef, DetectionError, Host, InstallMethod, Installation, Platform, Version};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const NPM: &str = "npm";

/// Shape of `npm list -g --depth=0 --json`.
#[derive(Debug, Default, Deserialize)]
struct NpmListing {
    #[serde(default)]
    dependencies: HashMap<String, NpmDependency>,
}

#[derive(Debug, Default, Deserialize)]
struct NpmDependency {
    #[serde(default)]
    version: Option<String>,
}

/// Parse the global listing into package name -> version.
///
/// A package present without a version (npm prints these for broken or
/// extraneous installs) maps to [`Version::unknown`].
fn parse_listing(json: &str) -> Result<HashMap<String, Version>, DetectionError> {
    let listing: NpmListing = serde_json::from_str(json).map_err(|e| DetectionError::Parse {
        source_name: "npm list".to_string(),
        message: e.to_string(),
    })?;
    Ok(listing
        .dependencies
        .into_iter()
        .map(|(name, dep)| {
            let version = dep
                .version
                .as_deref()
                .map(Version::parse)
                .unwrap_or_else(Version::unknown);
            (name, version)
        })
        .collect())
}

/// The npm package an agent declares, if it has an npm method on `platform`.
pub(crate) fn npm_package(agent: &AgentDef, platform: Platform) -> Option<String> {
    let method = agent.method_for("npm", platform)?;
    method
        .declared_package()
        .map(str::to_string)
        .or_else(|| npm_package_from_command(&method.command))
}

/// Finds agents installed with `npm install -g`.
///
/// Runs `npm list -g --depth=0 --json` once per scan and looks each agent's
/// package up in the listing.
pub struct NpmStrategy {
    host: Arc<dyn Host>,
}

impl NpmStrategy {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self { host }
    }

    async fn global_packages(
        &self,
        cancel: &CancellationToken,
        npm: &Path,
    ) -> Result<Option<HashMap<String, Version>>, DetectionError> {
        let output = run_tool(
            self.host.as_ref(),
            cancel,
            npm,
            &["list", "-g", "--depth=0", "--json"],
        )
        .await;
        let Some(output) = tolerate(output, "npm list")? else {
            return Ok(None);
        };

        // npm exits 1 on peer-dependency problems but still prints the listing.
        if !output.success {
            tracing::debug!(code = ?output.code, "npm list exited unsuccessfully");
        }
        tolerate(parse_listing(&output.stdout), "npm list")
    }

    async fn global_root(&self, cancel: &CancellationToken, npm: &Path) -> Result<Option<PathBuf>, DetectionError> {
        let output = run_tool(self.host.as_ref(), cancel, npm, &["root", "-g"])
            .await
            .and_then(|output| output.require_success("npm root"));
        Ok(tolerate(output, "npm root")?
            .map(|output| output.stdout.trim().to_string())
            .filter(|root| !root.is_empty())
            .map(PathBuf::from))
    }
}

#[async_trait]
impl DetectionStrategy for NpmStrategy {
    fn name(&self) -> &str {
        NPM
    }

    fn method(&self) -> InstallMethod {
        InstallMethod::Npm
    }

    fn is_applicable(&self, _platform: Platform) -> bool {
        self.host.find_executable(NPM).is_some()
    }

    async fn detect(
        &self,
        cancel: &CancellationToken,
        agents: &[AgentDef],
    ) -> Result<Vec<Installation>, DetectionError> {
        ensure_not_cancelled(cancel)?;
        let platform = self.host.platform();

        let wanted: Vec<(&AgentDef, String)> = agents
            .iter()
            .filter_map(|agent| npm_package(agent, platform).map(|package| (agent, package)))
            .collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let Some(npm) = self.host.find_executable(NPM) else {
            return Ok(Vec::new());
        };
        let Some(installed) = self.global_packages(cancel, &npm).await? else {
            return Ok(Vec::new());
        };

        let hits: Vec<_> = wanted
            .into_iter()
            .filter_map(|(agent, package)| {
                let version = installed.get(&package)?.clone();
                Some((agent, package, version))
            })
            .collect();
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let root = self.global_root(cancel, &npm).await?;
        Ok(hits
            .into_iter()
            .map(|(agent, package, version)| {
                let installation = package_installation(
                    self.host.as_ref(),
                    agent,
                    self.name(),
                    InstallMethod::Npm,
                    &package,
                    version,
                );
                match &root {
                    Some(root) => installation.with_install_path(root.join(&package)),
                    None => installation,
                }
            })
            .collect())
    }
}
