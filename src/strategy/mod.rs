//! Detection strategies: one per install-method family.
//!
//! Each strategy knows how to find installations made through one family of
//! install methods. The [`Detector`](crate::Detector) runs every applicable
//! strategy concurrently and merges their results.

mod binary;
mod brew;
mod npm;
mod pip;

pub use binary::BinaryStrategy;
pub use brew::BrewStrategy;
pub use npm::NpmStrategy;
pub use pip::PipStrategy;

pub(crate) use brew::{brew_info, brew_package};
pub(crate) use npm::npm_package;

use crate::{AgentDef, DetectionError, Host, InstallMethod, Installation, Platform, Version};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// A way of discovering installations for one install-method family.
///
/// Implementations hold no mutable state between calls; every `detect` is
/// an independent scan.
///
/// # Errors
///
/// `detect` swallows per-agent failures (missing tools, non-zero exits,
/// unparseable output) and simply leaves that agent out. It returns an error
/// only when the run cannot proceed at all, which in practice means
/// [`DetectionError::Cancelled`].
#[async_trait]
pub trait DetectionStrategy: Send + Sync {
    /// Stable identifier for logging and diagnostics.
    fn name(&self) -> &str;

    /// The install method this strategy primarily reports.
    fn method(&self) -> InstallMethod;

    /// Whether this strategy can run on this machine at all.
    ///
    /// Must be cheap and must not spawn processes.
    fn is_applicable(&self, platform: Platform) -> bool;

    /// Scan for installations of `agents`.
    async fn detect(
        &self,
        cancel: &CancellationToken,
        agents: &[AgentDef],
    ) -> Result<Vec<Installation>, DetectionError>;
}

pub(crate) const METADATA_STRATEGY: &str = "strategy";
pub(crate) const METADATA_EXECUTABLE: &str = "executable";
pub(crate) const METADATA_PACKAGE: &str = "package";
pub(crate) const METADATA_SOURCE_METHOD: &str = "source_method";

pub(crate) fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), DetectionError> {
    if cancel.is_cancelled() {
        Err(DetectionError::Cancelled)
    } else {
        Ok(())
    }
}

/// Keep cancellation fatal, turn every other failure into "not found".
pub(crate) fn tolerate<T>(
    result: Result<T, DetectionError>,
    context: &str,
) -> Result<Option<T>, DetectionError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(DetectionError::Cancelled) => Err(DetectionError::Cancelled),
        Err(e) => {
            tracing::debug!(context, error = %e, "ignoring failed lookup");
            Ok(None)
        }
    }
}

/// Run a package-manager tool with string arguments.
pub(crate) async fn run_tool(
    host: &dyn Host,
    cancel: &CancellationToken,
    tool: &Path,
    args: &[&str],
) -> Result<crate::CommandOutput, DetectionError> {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    host.run(cancel, tool, &args).await
}

/// First declared executable name that resolves on this host.
pub(crate) fn resolve_executable(host: &dyn Host, agent: &AgentDef) -> Option<(String, PathBuf)> {
    agent
        .detection
        .executables
        .iter()
        .find_map(|name| host.find_executable(name).map(|path| (name.clone(), path)))
}

/// Installation record for a package found by a package manager.
///
/// The executable is resolved through the agent's declared names; when none
/// resolves, the record is still produced with an empty executable path.
pub(crate) fn package_installation(
    host: &dyn Host,
    agent: &AgentDef,
    strategy: &str,
    method: InstallMethod,
    package: &str,
    version: Version,
) -> Installation {
    let executable = resolve_executable(host, agent);
    let path = executable
        .as_ref()
        .map(|(_, path)| path.clone())
        .unwrap_or_default();

    let mut installation = Installation::new(&agent.id, agent.display_name(), method, version, path)
        .with_global(true)
        .with_metadata(METADATA_STRATEGY, strategy)
        .with_metadata(METADATA_PACKAGE, package);
    if let Some((name, _)) = executable {
        installation = installation.with_metadata(METADATA_EXECUTABLE, name);
    }
    installation
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::host::fake::FakeHost;

    #[test]
    fn test_tolerate_keeps_cancellation() {
        assert_eq!(tolerate::<()>(Err(DetectionError::Cancelled), "x"), Err(DetectionError::Cancelled));
        let swallowed = tolerate::<()>(
            Err(DetectionError::CommandFailed {
                program: "pip".to_string(),
                code: Some(1),
            }),
            "x",
        );
        assert_eq!(swallowed, Ok(None));
        assert_eq!(tolerate(Ok(3), "x"), Ok(Some(3)));
    }

    #[test]
    fn test_resolve_executable_in_priority_order() {
        let host = FakeHost::new()
            .with_executable("claude-code", "/opt/bin/claude-code")
            .with_executable("claude", "/usr/local/bin/claude");
        let agent = agent("claude-code", &["claude", "claude-code"], &[]);
        assert_eq!(
            resolve_executable(&host, &agent),
            Some(("claude".to_string(), PathBuf::from("/usr/local/bin/claude")))
        );
    }

    #[test]
    fn test_package_installation_without_executable() {
        let host = FakeHost::new();
        let agent = agent("aider", &["aider"], &[]);
        let install = package_installation(
            &host,
            &agent,
            "pip",
            InstallMethod::Pipx,
            "aider-chat",
            Version::parse("0.50.1"),
        );
        assert!(install.executable_path().is_none());
        assert_eq!(install.metadata.get(METADATA_PACKAGE).map(String::as_str), Some("aider-chat"));
        assert!(!install.metadata.contains_key(METADATA_EXECUTABLE));
    }
}
