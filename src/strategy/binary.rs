//! Standalone binaries found on PATH (`native`, `binary`, `curl` installs).

use super::{
    ensure_not_cancelled, tolerate, DetectionStrategy, METADATA_EXECUTABLE, METADATA_SOURCE_METHOD,
    METADATA_STRATEGY,
};
use crate::detection::{extract_version, matching_pattern, probe_version};
use crate::{AgentDef, DetectionError, Host, InstallMethod, Installation, Platform, Version};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Catalog method names this strategy reports, in preference order.
const METHOD_PRIORITY: &[(&str, InstallMethod)] = &[
    ("native", InstallMethod::Native),
    ("binary", InstallMethod::Binary),
    ("curl", InstallMethod::Curl),
];

/// Finds agents installed as standalone executables.
///
/// For each agent declaring a `native`, `binary` or `curl` method, the
/// declared executable names are looked up on PATH in order. A hit whose
/// path (or symlink target) lies under a package manager's directory is
/// rejected, so an npm-installed `claude` is not also reported as native.
/// The first accepted hit whose version probe succeeds is reported.
pub struct BinaryStrategy {
    host: Arc<dyn Host>,
    managed_path_patterns: Vec<String>,
}

impl BinaryStrategy {
    /// Strategy using the default managed-path patterns.
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self::with_managed_path_patterns(host, crate::DetectOptions::default().managed_path_patterns)
    }

    /// Strategy rejecting executables whose path contains any of `patterns`.
    pub fn with_managed_path_patterns(host: Arc<dyn Host>, patterns: Vec<String>) -> Self {
        Self {
            host,
            managed_path_patterns: patterns,
        }
    }

    /// The managed-path pattern `path` or its symlink target matches.
    fn managed_by(&self, path: &Path) -> Option<String> {
        if let Some(pattern) = matching_pattern(path, &self.managed_path_patterns) {
            return Some(pattern.to_string());
        }
        let target = self.host.canonicalize(path)?;
        matching_pattern(&target, &self.managed_path_patterns).map(str::to_string)
    }

    async fn detect_agent(
        &self,
        cancel: &CancellationToken,
        agent: &AgentDef,
        platform: Platform,
    ) -> Result<Option<Installation>, DetectionError> {
        let Some((method_name, method)) = METHOD_PRIORITY
            .iter()
            .find(|(name, _)| agent.method_for(name, platform).is_some())
            .copied()
        else {
            return Ok(None);
        };

        for exe_name in &agent.detection.executables {
            let Some(path) = self.host.find_executable(exe_name) else {
                continue;
            };

            if let Some(pattern) = self.managed_by(&path) {
                tracing::debug!(
                    agent = %agent.id,
                    path = %path.display(),
                    pattern,
                    "skipping executable owned by a package manager"
                );
                continue;
            }

            let probe = probe_version(
                self.host.as_ref(),
                cancel,
                &path,
                &agent.detection.version_command,
            )
            .await;
            let Some(output) = tolerate(probe, &agent.id)? else {
                continue;
            };

            let version = extract_version(&output, agent.detection.version_regex.as_deref())
                .unwrap_or_else(Version::unknown);

            let mut installation =
                Installation::new(&agent.id, agent.display_name(), method, version, &path)
                    .with_global(true)
                    .with_metadata(METADATA_STRATEGY, self.name())
                    .with_metadata(METADATA_EXECUTABLE, exe_name)
                    .with_metadata(METADATA_SOURCE_METHOD, method_name);
            if let Some(dir) = path.parent() {
                installation = installation.with_install_path(dir);
            }
            return Ok(Some(installation));
        }

        Ok(None)
    }
}

#[async_trait]
impl DetectionStrategy for BinaryStrategy {
    fn name(&self) -> &str {
        "binary"
    }

    fn method(&self) -> InstallMethod {
        InstallMethod::Native
    }

    fn is_applicable(&self, _platform: Platform) -> bool {
        true
    }

    async fn detect(
        &self,
        cancel: &CancellationToken,
        agents: &[AgentDef],
    ) -> Result<Vec<Installation>, DetectionError> {
        ensure_not_cancelled(cancel)?;
        let platform = self.host.platform();

        let mut found = Vec::new();
        for agent in agents {
            if let Some(installation) = self.detect_agent(cancel, agent, platform).await? {
                found.push(installation);
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;
    use crate::strategy::test_support::{agent, method};
    use crate::CommandOutput;
    use std::path::PathBuf;

    fn claude_native() -> AgentDef {
        agent("claude-code", &["claude"], &[("native", method("curl -fsSL https://claude.ai/install.sh | bash"))])
    }

    async fn run(host: FakeHost, agents: &[AgentDef]) -> Vec<Installation> {
        BinaryStrategy::new(Arc::new(host))
            .detect(&CancellationToken::new(), agents)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_native_install_detected() {
        let host = FakeHost::new()
            .with_executable("claude", "/usr/local/bin/claude")
            .with_output(
                "/usr/local/bin/claude --version",
                CommandOutput::ok("claude-code version 1.0.5"),
            );
        let found = run(host, &[claude_native()]).await;

        assert_eq!(found.len(), 1);
        let install = &found[0];
        assert_eq!(install.method, InstallMethod::Native);
        assert_eq!(install.installed_version, Version::new(1, 0, 5));
        assert_eq!(install.executable_path, PathBuf::from("/usr/local/bin/claude"));
        assert_eq!(install.install_path, Some(PathBuf::from("/usr/local/bin")));
        assert_eq!(install.metadata["executable"], "claude");
        assert_eq!(install.metadata["source_method"], "native");
    }

    #[tokio::test]
    async fn test_node_modules_path_rejected() {
        let host = FakeHost::new()
            .with_executable("claude", "/usr/local/lib/node_modules/.bin/claude")
            .with_output(
                "/usr/local/lib/node_modules/.bin/claude --version",
                CommandOutput::ok("1.0.5"),
            );
        let found = run(host, &[claude_native()]).await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_symlink_into_node_modules_rejected() {
        let host = FakeHost::new()
            .with_executable("claude", "/usr/local/bin/claude")
            .with_link(
                "/usr/local/bin/claude",
                "/usr/local/lib/node_modules/@anthropic-ai/claude-code/cli.js",
            )
            .with_output("/usr/local/bin/claude --version", CommandOutput::ok("1.0.5"));
        let host = Arc::new(host);
        let strategy = BinaryStrategy::new(host.clone());
        let found = strategy
            .detect(&CancellationToken::new(), &[claude_native()])
            .await
            .unwrap();
        assert!(found.is_empty());
        assert!(host.calls().is_empty(), "rejected executable must not be probed");
    }

    #[tokio::test]
    async fn test_method_priority_is_fixed() {
        let agent = agent(
            "goose",
            &["goose"],
            &[
                ("curl", method("curl -fsSL https://example.com/install | bash")),
                ("binary", method("download")),
            ],
        );
        let host = FakeHost::new()
            .with_executable("goose", "/opt/goose/bin/goose")
            .with_output("/opt/goose/bin/goose --version", CommandOutput::ok("goose 1.2.0"));
        let found = run(host, &[agent]).await;
        assert_eq!(found[0].method, InstallMethod::Binary);
    }

    #[tokio::test]
    async fn test_agent_without_binary_methods_skipped() {
        let agent = agent("codex", &["codex"], &[("npm", method("npm install -g @openai/codex"))]);
        let host = FakeHost::new().with_executable("codex", "/usr/bin/codex");
        let found = run(host, &[agent]).await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_platform_restricted_method_skipped() {
        let mut native = method("irm https://claude.ai/install.ps1 | iex");
        native.platforms = vec![Platform::Windows];
        let agent = agent("claude-code", &["claude"], &[("native", native)]);
        let host = FakeHost::new()
            .with_platform(Platform::Linux)
            .with_executable("claude", "/usr/local/bin/claude")
            .with_output("/usr/local/bin/claude --version", CommandOutput::ok("1.0.5"));
        assert!(run(host, &[agent]).await.is_empty());
    }

    #[tokio::test]
    async fn test_falls_through_to_next_executable() {
        let agent = agent(
            "claude-code",
            &["claude", "claude-code"],
            &[("native", method("install"))],
        );
        let host = FakeHost::new()
            .with_executable("claude", "/home/u/.npm-global/bin/claude")
            .with_executable("claude-code", "/home/u/.local/bin/claude-code")
            .with_output("/home/u/.local/bin/claude-code --version", CommandOutput::ok("2.0.1"));
        let found = run(host, &[agent]).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata["executable"], "claude-code");
        assert_eq!(found[0].installed_version, Version::new(2, 0, 1));
    }

    #[tokio::test]
    async fn test_failed_probe_omits_agent() {
        let host = FakeHost::new()
            .with_executable("claude", "/usr/local/bin/claude")
            .with_output("/usr/local/bin/claude --version", CommandOutput::failed(127, "boom"));
        assert!(run(host, &[claude_native()]).await.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_version_degrades_to_unknown() {
        let host = FakeHost::new()
            .with_executable("claude", "/usr/local/bin/claude")
            .with_output("/usr/local/bin/claude --version", CommandOutput::ok("dev build"));
        let found = run(host, &[claude_native()]).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].installed_version, Version::unknown());
    }

    #[tokio::test]
    async fn test_custom_regex_used() {
        let mut agent = claude_native();
        agent.detection.version_regex = Some(r"build (\d+\.\d+\.\d+)".to_string());
        let host = FakeHost::new()
            .with_executable("claude", "/usr/local/bin/claude")
            .with_output(
                "/usr/local/bin/claude --version",
                CommandOutput::ok("claude 9.9.9 build 1.2.3"),
            );
        let found = run(host, &[agent]).await;
        assert_eq!(found[0].installed_version, Version::new(1, 2, 3));
    }

    #[tokio::test]
    async fn test_custom_denylist() {
        let host = FakeHost::new()
            .with_executable("claude", "/opt/corp/bin/claude")
            .with_output("/opt/corp/bin/claude --version", CommandOutput::ok("1.0.0"));
        let strategy =
            BinaryStrategy::with_managed_path_patterns(Arc::new(host), vec!["/opt/corp/".to_string()]);
        let found = strategy
            .detect(&CancellationToken::new(), &[claude_native()])
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_probe_aborts() {
        let host = FakeHost::new()
            .with_executable("claude", "/usr/local/bin/claude")
            .with_error("/usr/local/bin/claude --version", DetectionError::Cancelled);
        let result = BinaryStrategy::new(Arc::new(host))
            .detect(&CancellationToken::new(), &[claude_native()])
            .await;
        assert_eq!(result, Err(DetectionError::Cancelled));
    }

    #[test]
    fn test_always_applicable() {
        let strategy = BinaryStrategy::new(Arc::new(FakeHost::new()));
        assert!(strategy.is_applicable(Platform::Windows));
        assert!(strategy.is_applicable(Platform::Linux));
        assert_eq!(strategy.name(), "binary");
        assert_eq!(strategy.method(), InstallMethod::Native);
    }
}
