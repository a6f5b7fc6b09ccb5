//! Detection orchestration.

use crate::strategy::{BinaryStrategy, BrewStrategy, DetectionStrategy, NpmStrategy, PipStrategy};
use crate::{AgentDef, DetectOptions, DetectionError, Host, Installation, Platform};
use futures::future::join_all;
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs registered detection strategies and merges their findings.
///
/// Strategies are kept in registration order. A run executes every
/// applicable strategy concurrently; when two strategies report the same
/// installation (same agent, method and executable path), the one registered
/// first wins, so the merged list is the same on every run.
///
/// Registration may happen while a run is in progress: a run works on the
/// set of strategies registered when it started.
///
/// # Example
///
/// ```rust,no_run
/// use agent_inventory::{parse_catalog, DetectOptions, Detector, SystemHost};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let agents = parse_catalog(r#"[{"id": "claude-code",
///         "install_methods": {"native": {"command": "curl -fsSL https://claude.ai/install.sh | bash"}},
///         "detection": {"executables": ["claude"], "version_command": "claude --version"}}]"#)
///         .unwrap();
///
///     let options = DetectOptions::default();
///     let host = Arc::new(SystemHost::new(options.command_timeout));
///     let detector = Detector::with_default_strategies(host, &options);
///
///     let found = detector.detect_all(&CancellationToken::new(), &agents).await.unwrap();
///     for install in &found {
///         println!("{} {} via {}", install.agent_name, install.installed_version, install.method);
///     }
/// }
/// ```
pub struct Detector {
    platform: Platform,
    strategies: RwLock<Vec<Arc<dyn DetectionStrategy>>>,
}

impl Detector {
    /// An empty detector for the current platform.
    pub fn new() -> Self {
        Self::with_platform(Platform::current())
    }

    /// An empty detector gating strategies on `platform`.
    pub fn with_platform(platform: Platform) -> Self {
        Self {
            platform,
            strategies: RwLock::new(Vec::new()),
        }
    }

    /// A detector with the four built-in strategies registered in priority
    /// order: binary, npm, pip, brew.
    pub fn with_default_strategies(host: Arc<dyn Host>, options: &DetectOptions) -> Self {
        let detector = Self::with_platform(host.platform());
        detector.register_strategy(Arc::new(BinaryStrategy::with_managed_path_patterns(
            host.clone(),
            options.managed_path_patterns.clone(),
        )));
        detector.register_strategy(Arc::new(NpmStrategy::new(host.clone())));
        detector.register_strategy(Arc::new(PipStrategy::new(host.clone())));
        detector.register_strategy(Arc::new(BrewStrategy::new(host)));
        detector
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Append a strategy. Earlier registrations win deduplication ties.
    pub fn register_strategy(&self, strategy: Arc<dyn DetectionStrategy>) {
        tracing::debug!(strategy = strategy.name(), "registering detection strategy");
        self.strategies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(strategy);
    }

    /// Names of the registered strategies, in registration order.
    pub fn strategy_names(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|strategy| strategy.name().to_string())
            .collect()
    }

    fn snapshot(&self) -> Vec<Arc<dyn DetectionStrategy>> {
        self.strategies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run every applicable strategy and return the deduplicated union.
    ///
    /// # Detection Process
    ///
    /// 1. Snapshot the registered strategies and drop those not applicable
    ///    on this platform
    /// 2. Run the rest concurrently; a strategy that fails, panics or is cut
    ///    off by cancellation contributes nothing
    /// 3. Merge in registration order, keeping the first installation for
    ///    each identity key
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::Cancelled`] only when `cancel` fired before
    /// the run started. Cancellation during the run yields whatever the
    /// strategies that had already finished found.
    pub async fn detect_all(
        &self,
        cancel: &CancellationToken,
        agents: &[AgentDef],
    ) -> Result<Vec<Installation>, DetectionError> {
        if cancel.is_cancelled() {
            return Err(DetectionError::Cancelled);
        }

        let strategies: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|strategy| {
                let applicable = strategy.is_applicable(self.platform);
                if !applicable {
                    tracing::debug!(strategy = strategy.name(), platform = %self.platform, "strategy not applicable");
                }
                applicable
            })
            .collect();

        let runs = strategies
            .iter()
            .map(|strategy| run_strategy(strategy.as_ref(), cancel, agents));
        let results = join_all(runs).await;

        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for installation in results.into_iter().flatten() {
            if seen.insert(installation.key()) {
                merged.push(installation);
            } else {
                tracing::debug!(key = %installation.key(), "dropping duplicate installation");
            }
        }

        tracing::info!(
            strategies = strategies.len(),
            installations = merged.len(),
            cancelled = cancel.is_cancelled(),
            "detection finished"
        );
        Ok(merged)
    }

    /// [`detect_all`](Self::detect_all) bounded by `timeout`.
    ///
    /// When the budget runs out the run is cancelled and the installations
    /// found so far are returned.
    pub async fn detect_all_with_timeout(
        &self,
        agents: &[AgentDef],
        timeout: Duration,
    ) -> Result<Vec<Installation>, DetectionError> {
        self.detect_bounded(&CancellationToken::new(), agents, timeout)
            .await
            .map(|(found, _)| found)
    }

    /// Run under `cancel` for at most `timeout`.
    ///
    /// The flag is true when every strategy ran to completion, false when
    /// the run was cut short by `cancel` or by the budget.
    pub(crate) async fn detect_bounded(
        &self,
        cancel: &CancellationToken,
        agents: &[AgentDef],
        timeout: Duration,
    ) -> Result<(Vec<Installation>, bool), DetectionError> {
        let run = cancel.child_token();
        let detection = self.detect_all(&run, agents);
        tokio::pin!(detection);

        let found = tokio::select! {
            result = &mut detection => result?,
            () = tokio::time::sleep(timeout) => {
                tracing::warn!(?timeout, "detection timed out, returning partial results");
                run.cancel();
                detection.await?
            }
        };
        Ok((found, !run.is_cancelled()))
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

/// One strategy's contribution, with failures, panics and cancellation
/// flattened to "nothing found".
async fn run_strategy(
    strategy: &dyn DetectionStrategy,
    cancel: &CancellationToken,
    agents: &[AgentDef],
) -> Vec<Installation> {
    let name = strategy.name();
    let scan = AssertUnwindSafe(strategy.detect(cancel, agents)).catch_unwind();

    let outcome = tokio::select! {
        biased;
        outcome = scan => outcome,
        () = cancel.cancelled() => Ok(Err(DetectionError::Cancelled)),
    };

    match outcome {
        Ok(Ok(found)) => {
            tracing::debug!(strategy = name, installations = found.len(), "strategy finished");
            found
        }
        Ok(Err(DetectionError::Cancelled)) => {
            tracing::debug!(strategy = name, "strategy cancelled");
            Vec::new()
        }
        Ok(Err(e)) => {
            tracing::warn!(strategy = name, error = %e, "strategy failed");
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(strategy = name, "strategy panicked");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;
    use crate::strategy::test_support::{agent, method};
    use crate::{CommandOutput, InstallMethod, Version};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed installations and counts its invocations.
    struct Scripted {
        name: &'static str,
        applicable: bool,
        found: Vec<Installation>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, found: Vec<Installation>) -> Self {
            Self {
                name,
                applicable: true,
                found,
                calls: AtomicUsize::new(0),
            }
        }

        fn inapplicable(name: &'static str) -> Self {
            Self {
                applicable: false,
                ..Self::new(name, Vec::new())
            }
        }
    }

    #[async_trait]
    impl DetectionStrategy for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn method(&self) -> InstallMethod {
            InstallMethod::Native
        }

        fn is_applicable(&self, _platform: Platform) -> bool {
            self.applicable
        }

        async fn detect(
            &self,
            _cancel: &CancellationToken,
            _agents: &[AgentDef],
        ) -> Result<Vec<Installation>, DetectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.found.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl DetectionStrategy for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn method(&self) -> InstallMethod {
            InstallMethod::Npm
        }

        fn is_applicable(&self, _platform: Platform) -> bool {
            true
        }

        async fn detect(
            &self,
            _cancel: &CancellationToken,
            _agents: &[AgentDef],
        ) -> Result<Vec<Installation>, DetectionError> {
            Err(DetectionError::Parse {
                source_name: "npm list".to_string(),
                message: "bad json".to_string(),
            })
        }
    }

    struct Panicking;

    #[async_trait]
    impl DetectionStrategy for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn method(&self) -> InstallMethod {
            InstallMethod::Brew
        }

        fn is_applicable(&self, _platform: Platform) -> bool {
            true
        }

        async fn detect(
            &self,
            _cancel: &CancellationToken,
            _agents: &[AgentDef],
        ) -> Result<Vec<Installation>, DetectionError> {
            panic!("strategy bug");
        }
    }

    /// Never finishes until cancelled.
    struct Hanging;

    #[async_trait]
    impl DetectionStrategy for Hanging {
        fn name(&self) -> &str {
            "hanging"
        }

        fn method(&self) -> InstallMethod {
            InstallMethod::Pip
        }

        fn is_applicable(&self, _platform: Platform) -> bool {
            true
        }

        async fn detect(
            &self,
            _cancel: &CancellationToken,
            _agents: &[AgentDef],
        ) -> Result<Vec<Installation>, DetectionError> {
            std::future::pending().await
        }
    }

    fn install(agent: &str, method: InstallMethod, path: &str, version: &str) -> Installation {
        Installation::new(agent, agent, method, Version::parse(version), path)
    }

    #[tokio::test]
    async fn test_no_strategies_returns_empty() {
        let detector = Detector::with_platform(Platform::Linux);
        let found = detector.detect_all(&CancellationToken::new(), &[]).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_precancelled_is_error() {
        let detector = Detector::with_platform(Platform::Linux);
        detector.register_strategy(Arc::new(Scripted::new("a", Vec::new())));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(detector.detect_all(&cancel, &[]).await, Err(DetectionError::Cancelled));
    }

    #[tokio::test]
    async fn test_inapplicable_strategy_never_runs() {
        let detector = Detector::with_platform(Platform::Windows);
        let skipped = Arc::new(Scripted::inapplicable("skipped"));
        detector.register_strategy(skipped.clone());
        detector.detect_all(&CancellationToken::new(), &[]).await.unwrap();
        assert_eq!(skipped.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_registered_wins_duplicates() {
        let detector = Detector::with_platform(Platform::Linux);
        let first = install("claude-code", InstallMethod::Npm, "/usr/bin/claude", "1.0.0");
        let mut second = install("claude-code", InstallMethod::Npm, "/usr/bin/claude", "2.0.0");
        second.metadata.insert("strategy".to_string(), "second".to_string());
        let other = install("claude-code", InstallMethod::Native, "/opt/claude", "1.0.0");

        detector.register_strategy(Arc::new(Scripted::new("first", vec![first.clone()])));
        detector.register_strategy(Arc::new(Scripted::new("second", vec![second, other.clone()])));

        for _ in 0..5 {
            let found = detector.detect_all(&CancellationToken::new(), &[]).await.unwrap();
            assert_eq!(found, vec![first.clone(), other.clone()]);
        }
    }

    #[tokio::test]
    async fn test_failing_and_panicking_strategies_isolated() {
        let detector = Detector::with_platform(Platform::Linux);
        let good = install("goose", InstallMethod::Brew, "/opt/homebrew/bin/goose", "1.0.0");
        detector.register_strategy(Arc::new(Failing));
        detector.register_strategy(Arc::new(Panicking));
        detector.register_strategy(Arc::new(Scripted::new("good", vec![good.clone()])));

        let found = detector.detect_all(&CancellationToken::new(), &[]).await.unwrap();
        assert_eq!(found, vec![good]);
    }

    #[tokio::test]
    async fn test_timeout_returns_partial_results() {
        let detector = Detector::with_platform(Platform::Linux);
        let quick = install("aider", InstallMethod::Pipx, "/home/u/.local/bin/aider", "0.50.1");
        detector.register_strategy(Arc::new(Hanging));
        detector.register_strategy(Arc::new(Scripted::new("quick", vec![quick.clone()])));

        let found = detector
            .detect_all_with_timeout(&[], Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(found, vec![quick]);
    }

    #[tokio::test]
    async fn test_bounded_run_reports_completeness() {
        let detector = Detector::with_platform(Platform::Linux);
        detector.register_strategy(Arc::new(Scripted::new("quick", Vec::new())));
        let (_, complete) = detector
            .detect_bounded(&CancellationToken::new(), &[], Duration::from_secs(5))
            .await
            .unwrap();
        assert!(complete);

        detector.register_strategy(Arc::new(Hanging));
        let (_, complete) = detector
            .detect_bounded(&CancellationToken::new(), &[], Duration::from_millis(20))
            .await
            .unwrap();
        assert!(!complete);
    }

    #[test]
    fn test_default_strategy_order() {
        let host: Arc<dyn Host> = Arc::new(FakeHost::new().with_platform(Platform::Darwin));
        let detector = Detector::with_default_strategies(host, &DetectOptions::default());
        assert_eq!(detector.strategy_names(), vec!["binary", "npm", "pip", "brew"]);
        assert_eq!(detector.platform(), Platform::Darwin);
    }

    #[tokio::test]
    async fn test_default_strategies_end_to_end() {
        let host = FakeHost::new()
            .with_executable("goose", "/usr/local/bin/goose")
            .with_output("/usr/local/bin/goose --version", CommandOutput::ok("goose 1.0.3"));
        let agents = [agent("goose", &["goose"], &[("curl", method("curl -fsSL https://example.com | bash"))])];
        let detector = Detector::with_default_strategies(Arc::new(host), &DetectOptions::default());

        let found = detector.detect_all(&CancellationToken::new(), &agents).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].method, InstallMethod::Curl);
    }
}
