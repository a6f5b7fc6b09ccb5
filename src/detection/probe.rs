//! Running an agent's version-probe command.

use crate::{DetectionError, Host};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Arguments used when the catalog declares no probe command.
const DEFAULT_PROBE_ARGS: &[&str] = &["--version"];

/// Split a probe template like `claude --version` into its arguments.
///
/// The first token names the executable and is dropped: the caller runs the
/// resolved path instead, so a template written against `claude` still works
/// when PATH resolves it to `/usr/local/bin/claude`.
pub(crate) fn probe_args(template: &str) -> Vec<String> {
    let mut tokens = template.split_whitespace();
    match tokens.next() {
        Some(_) => tokens.map(str::to_string).collect(),
        None => DEFAULT_PROBE_ARGS.iter().map(|s| s.to_string()).collect(),
    }
}

/// Run the version probe for an executable and return its combined output.
///
/// # Returns
///
/// Stdout followed by stderr (some tools print their version on stderr),
/// or a `DetectionError` on failure:
/// - `CommandFailed` if the probe exits non-zero
/// - `Timeout`, `Cancelled`, `PermissionDenied`, `Io` from the host
pub(crate) async fn probe_version(
    host: &dyn Host,
    cancel: &CancellationToken,
    executable: &Path,
    template: &str,
) -> Result<String, DetectionError> {
    let args = probe_args(template);
    let output = host.run(cancel, executable, &args).await?;
    let output = output.require_success(&executable.display().to_string())?;
    Ok(output.combined())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;
    use crate::CommandOutput;

    #[test]
    fn test_probe_args_replace_program() {
        assert_eq!(probe_args("claude --version"), vec!["--version"]);
        assert_eq!(probe_args("aider --version --no-check"), vec!["--version", "--no-check"]);
        assert_eq!(probe_args("goose"), Vec::<String>::new());
        assert_eq!(probe_args("   "), vec!["--version"]);
    }

    #[tokio::test]
    async fn test_probe_runs_resolved_path() {
        let host = FakeHost::new().with_output(
            "/usr/local/bin/claude --version",
            CommandOutput::ok("1.0.5 (Claude Code)"),
        );
        let out = probe_version(
            &host,
            &CancellationToken::new(),
            Path::new("/usr/local/bin/claude"),
            "claude --version",
        )
        .await
        .unwrap();
        assert_eq!(out, "1.0.5 (Claude Code)");
        assert_eq!(host.calls(), vec!["/usr/local/bin/claude --version"]);
    }

    #[tokio::test]
    async fn test_probe_combines_stderr() {
        let host = FakeHost::new().with_output(
            "/bin/tool -V",
            CommandOutput {
                code: Some(0),
                success: true,
                stdout: String::new(),
                stderr: "tool v2.0.0".to_string(),
            },
        );
        let out = probe_version(&host, &CancellationToken::new(), Path::new("/bin/tool"), "tool -V")
            .await
            .unwrap();
        assert_eq!(out, "tool v2.0.0");
    }

    #[tokio::test]
    async fn test_probe_nonzero_exit_is_error() {
        let host = FakeHost::new().with_output("/bin/tool --version", CommandOutput::failed(1, "nope"));
        let result =
            probe_version(&host, &CancellationToken::new(), Path::new("/bin/tool"), "").await;
        assert!(matches!(result, Err(DetectionError::CommandFailed { code: Some(1), .. })));
    }
}
