//! Error types for detection and caching.

use std::time::Duration;
use thiserror::Error;

/// Typed error variants for detection failures.
///
/// Most of these never reach the caller of
/// [`Detector::detect_all`](crate::Detector::detect_all): strategies swallow
/// per-agent failures and the detector swallows per-strategy failures. They
/// surface from [`Host::run`](crate::Host::run) and
/// [`DetectionStrategy::detect`](crate::DetectionStrategy::detect), and
/// `Cancelled` is returned by `detect_all` itself when the token was
/// cancelled before any work started.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error types
/// in future versions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DetectionError {
    /// The cancellation token fired before or during the operation.
    #[error("detection cancelled")]
    Cancelled,

    /// A subprocess did not finish within the command timeout.
    #[error("{program} timed out after {timeout:?}")]
    Timeout {
        /// Program that was running.
        program: String,
        /// The limit that was exceeded.
        timeout: Duration,
    },

    /// Permission denied executing a program.
    #[error("permission denied running {program}")]
    PermissionDenied {
        /// Program that could not be run.
        program: String,
    },

    /// I/O error spawning or waiting on a program.
    #[error("failed to run {program}: {message}")]
    Io {
        /// Program that could not be run.
        program: String,
        /// Underlying I/O error message.
        message: String,
    },

    /// A program ran but exited unsuccessfully.
    #[error("{program} exited with status {code:?}")]
    CommandFailed {
        /// Program that failed.
        program: String,
        /// Exit code, if the process exited normally.
        code: Option<i32>,
    },

    /// Output of a program could not be understood.
    #[error("failed to parse {source_name} output: {message}")]
    Parse {
        /// What produced the output (e.g. "npm list").
        source_name: String,
        /// Description of what went wrong.
        message: String,
    },
}

impl DetectionError {
    /// Human-readable description of the error category.
    ///
    /// # Example
    ///
    /// ```rust
    /// use agent_inventory::DetectionError;
    ///
    /// assert_eq!(DetectionError::Cancelled.description(), "Detection cancelled");
    /// ```
    pub fn description(&self) -> &'static str {
        match self {
            Self::Cancelled => "Detection cancelled",
            Self::Timeout { .. } => "Command timed out",
            Self::PermissionDenied { .. } => "Permission denied",
            Self::Io { .. } => "I/O error during detection",
            Self::CommandFailed { .. } => "Command exited unsuccessfully",
            Self::Parse { .. } => "Failed to parse command output",
        }
    }

    /// Whether this error means the whole run should stop.
    ///
    /// Only cancellation is fatal; everything else is local to one agent.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors reading or writing the detection cache.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    /// Filesystem error.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The cache contents could not be (de)serialized.
    #[error("cache serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CacheError {
    /// Human-readable description of the error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Io(_) => "Cache I/O error",
            Self::Json(_) => "Cache contents are corrupt",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_error_descriptions() {
        assert_eq!(DetectionError::Cancelled.description(), "Detection cancelled");
        assert_eq!(
            DetectionError::Timeout {
                program: "npm".to_string(),
                timeout: Duration::from_secs(5),
            }
            .description(),
            "Command timed out"
        );
        assert_eq!(
            DetectionError::PermissionDenied {
                program: "brew".to_string()
            }
            .description(),
            "Permission denied"
        );
    }

    #[test]
    fn test_detection_error_display() {
        let error = DetectionError::CommandFailed {
            program: "pip".to_string(),
            code: Some(1),
        };
        assert_eq!(error.to_string(), "pip exited with status Some(1)");

        let error = DetectionError::Parse {
            source_name: "npm list".to_string(),
            message: "expected value".to_string(),
        };
        assert!(error.to_string().contains("npm list"));
    }

    #[test]
    fn test_only_cancelled_is_fatal() {
        assert!(DetectionError::Cancelled.is_cancelled());
        assert!(!DetectionError::Io {
            program: "uv".to_string(),
            message: "not found".to_string(),
        }
        .is_cancelled());
    }

    #[test]
    fn test_cache_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: CacheError = io.into();
        assert!(matches!(error, CacheError::Io(_)));
        assert_eq!(error.description(), "Cache I/O error");
    }
}
