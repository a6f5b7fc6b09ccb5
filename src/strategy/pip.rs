//! Python tools installed with pip, pipx or uv.

use super::{ensure_not_cancelled, package_installation, run_tool, tolerate, DetectionStrategy};
use crate::detection::pip_package_from_command;
use crate::{AgentDef, DetectionError, Host, InstallMethod, Installation, Platform, Version};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// pip executables in preference order.
const PIP_EXECUTABLES: &[&str] = &["pip", "pip3"];
const PIPX: &str = "pipx";
const UV: &str = "uv";

/// Catalog method names handled here, in reporting order.
const PYTHON_METHODS: &[(&str, InstallMethod)] = &[
    ("pip", InstallMethod::Pip),
    ("pipx", InstallMethod::Pipx),
    ("uv", InstallMethod::Uv),
];

/// Normalize a Python distribution name (PEP 503).
///
/// `Aider_Chat`, `aider.chat` and `aider-chat` all compare equal.
fn normalize(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut pending_separator = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            pending_separator = true;
            continue;
        }
        if pending_separator && !normalized.is_empty() {
            normalized.push('-');
        }
        pending_separator = false;
        normalized.push(c.to_ascii_lowercase());
    }
    normalized
}

/// Fields of interest from `pip show <pkg>`.
#[derive(Debug, Default, PartialEq, Eq)]
struct PipShow {
    version: Option<Version>,
    location: Option<PathBuf>,
}

fn parse_pip_show(output: &str) -> PipShow {
    let mut show = PipShow::default();
    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "Version" => show.version = Some(Version::parse(value)),
            "Location" => show.location = Some(PathBuf::from(value)),
            _ => {}
        }
    }
    show
}

#[derive(Debug, Default, Deserialize)]
struct PipxListing {
    #[serde(default)]
    venvs: HashMap<String, PipxVenv>,
}

#[derive(Debug, Default, Deserialize)]
struct PipxVenv {
    #[serde(default)]
    metadata: PipxMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct PipxMetadata {
    #[serde(default)]
    main_package: PipxPackage,
}

#[derive(Debug, Default, Deserialize)]
struct PipxPackage {
    #[serde(default)]
    package: Option<String>,
    #[serde(default)]
    package_version: Option<String>,
}

/// Parse `pipx list --json` into normalized name -> version.
fn parse_pipx_listing(json: &str) -> Result<HashMap<String, Version>, DetectionError> {
    let listing: PipxListing = serde_json::from_str(json).map_err(|e| DetectionError::Parse {
        source_name: "pipx list".to_string(),
        message: e.to_string(),
    })?;
    Ok(listing
        .venvs
        .into_iter()
        .map(|(venv, entry)| {
            let main = entry.metadata.main_package;
            let name = main.package.unwrap_or(venv);
            let version = main
                .package_version
                .as_deref()
                .map(Version::parse)
                .unwrap_or_else(Version::unknown);
            (normalize(&name), version)
        })
        .collect())
}

/// Parse the `uv tool list` table into normalized name -> version.
///
/// Tool lines look like `aider-chat v0.50.1`; the executables each tool
/// provides follow on lines starting with `-`.
fn parse_uv_listing(output: &str) -> HashMap<String, Version> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('-'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            let version = fields.next()?;
            let version = version.strip_prefix('v').unwrap_or(version);
            Some((normalize(name), Version::parse(version)))
        })
        .collect()
}

/// Finds agents installed as Python packages.
///
/// For every agent declaring `pip`, `pipx` or `uv`, the matching tool is
/// asked about the package. `pipx list` and `uv tool list` run at most once
/// per scan; `pip show` runs per package. An agent installed through
/// several tools yields one installation per tool.
pub struct PipStrategy {
    host: Arc<dyn Host>,
}

impl PipStrategy {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self { host }
    }

    fn pip_executable(&self) -> Option<PathBuf> {
        PIP_EXECUTABLES
            .iter()
            .find_map(|name| self.host.find_executable(name))
    }

    async fn pip_show(
        &self,
        cancel: &CancellationToken,
        pip: &Path,
        package: &str,
    ) -> Result<Option<PipShow>, DetectionError> {
        let output = run_tool(self.host.as_ref(), cancel, pip, &["show", package])
            .await
            .and_then(|output| output.require_success("pip show"));
        let Some(output) = tolerate(output, package)? else {
            return Ok(None);
        };
        let show = parse_pip_show(&output.stdout);
        Ok(show.version.is_some().then_some(show))
    }

    async fn pipx_listing(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<HashMap<String, Version>>, DetectionError> {
        let Some(pipx) = self.host.find_executable(PIPX) else {
            return Ok(None);
        };
        let output = run_tool(self.host.as_ref(), cancel, &pipx, &["list", "--json"])
            .await
            .and_then(|output| output.require_success("pipx list"));
        let Some(output) = tolerate(output, "pipx list")? else {
            return Ok(None);
        };
        tolerate(parse_pipx_listing(&output.stdout), "pipx list")
    }

    async fn uv_listing(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<HashMap<String, Version>>, DetectionError> {
        let Some(uv) = self.host.find_executable(UV) else {
            return Ok(None);
        };
        let output = run_tool(self.host.as_ref(), cancel, &uv, &["tool", "list"])
            .await
            .and_then(|output| output.require_success("uv tool list"));
        Ok(tolerate(output, "uv tool list")?.map(|output| parse_uv_listing(&output.stdout)))
    }
}

/// One `(agent, method, package)` to look up.
struct Wanted<'a> {
    agent: &'a AgentDef,
    method: InstallMethod,
    package: String,
}

fn wanted(agents: &[AgentDef], platform: Platform) -> Vec<Wanted<'_>> {
    let mut wanted = Vec::new();
    for agent in agents {
        for (name, method) in PYTHON_METHODS {
            let Some(def) = agent.method_for(name, platform) else {
                continue;
            };
            let package = def
                .declared_package()
                .map(str::to_string)
                .or_else(|| pip_package_from_command(&def.command));
            match package {
                Some(package) => wanted.push(Wanted {
                    agent,
                    method: *method,
                    package,
                }),
                None => tracing::debug!(agent = %agent.id, method = *name, "no package name for method"),
            }
        }
    }
    wanted
}

#[async_trait]
impl DetectionStrategy for PipStrategy {
    fn name(&self) -> &str {
        "pip"
    }

    fn method(&self) -> InstallMethod {
        InstallMethod::Pip
    }

    fn is_applicable(&self, _platform: Platform) -> bool {
        self.pip_executable().is_some()
            || self.host.find_executable(PIPX).is_some()
            || self.host.find_executable(UV).is_some()
    }

    async fn detect(
        &self,
        cancel: &CancellationToken,
        agents: &[AgentDef],
    ) -> Result<Vec<Installation>, DetectionError> {
        ensure_not_cancelled(cancel)?;
        let wanted = wanted(agents, self.host.platform());
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let needs = |method: InstallMethod| wanted.iter().any(|w| w.method == method);
        let pip = if needs(InstallMethod::Pip) {
            self.pip_executable()
        } else {
            None
        };
        let pipx = if needs(InstallMethod::Pipx) {
            self.pipx_listing(cancel).await?
        } else {
            None
        };
        let uv = if needs(InstallMethod::Uv) {
            self.uv_listing(cancel).await?
        } else {
            None
        };

        let mut found = Vec::new();
        for Wanted {
            agent,
            method,
            package,
        } in &wanted
        {
            let (version, location) = match method {
                InstallMethod::Pip => {
                    let Some(pip) = &pip else { continue };
                    let Some(show) = self.pip_show(cancel, pip, package).await? else {
                        continue;
                    };
                    (show.version.unwrap_or_else(Version::unknown), show.location)
                }
                InstallMethod::Pipx => {
                    let Some(version) = pipx.as_ref().and_then(|l| l.get(&normalize(package))) else {
                        continue;
                    };
                    (version.clone(), None)
                }
                InstallMethod::Uv => {
                    let Some(version) = uv.as_ref().and_then(|l| l.get(&normalize(package))) else {
                        continue;
                    };
                    (version.clone(), None)
                }
                _ => continue,
            };

            let mut installation =
                package_installation(self.host.as_ref(), agent, self.name(), *method, package, version);
            if let Some(location) = location {
                installation = installation.with_install_path(location);
            }
            found.push(installation);
        }
        Ok(found)
    }
}
