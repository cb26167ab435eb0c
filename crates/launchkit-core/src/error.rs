//! Error types for launchkit.
//!
//! Every fallible operation returns a [`LaunchError`] whose `Display` output is
//! the human-readable message shown by the front end. [`ErrorKind`] is the
//! coarse taxonomy callers branch on.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Coarse classification of a [`LaunchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Path empty, missing, or carrying the wrong extension.
    InvalidTarget,
    /// The OS refused to create the process.
    LaunchFailed,
    /// The target exists but cannot be executed.
    TargetNotExecutable,
    /// No matching live process.
    NotFound,
    /// Some but not all matches were terminated.
    PartialKillFailure,
    /// Every matched process survived termination.
    TerminationFailed,
    /// A blocking external invocation exceeded its bound.
    Timeout,
    /// The current platform lacks the required facility.
    PlatformUnsupported,
    /// Filesystem failure.
    Io,
    /// Settings or path store failure.
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidTarget => "invalid_target",
            ErrorKind::LaunchFailed => "launch_failed",
            ErrorKind::TargetNotExecutable => "target_not_executable",
            ErrorKind::NotFound => "not_found",
            ErrorKind::PartialKillFailure => "partial_kill_failure",
            ErrorKind::TerminationFailed => "termination_failed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::PlatformUnsupported => "platform_unsupported",
            ErrorKind::Io => "io",
            ErrorKind::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for launchkit.
#[derive(Debug, Error)]
pub enum LaunchError {
    // Target validation
    #[error("Path not set")]
    PathNotSet,

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Not an executable file ({reason}): {path}")]
    WrongExtension { path: PathBuf, reason: String },

    #[error("Target is not executable: {path}: {reason}")]
    TargetNotExecutable { path: PathBuf, reason: String },

    // Process creation
    #[error("Failed to launch {program}: {message}")]
    LaunchFailed { program: String, message: String },

    // Process table
    #[error("No running process matches '{name}'")]
    ProcessNotFound { name: String },

    #[error("Process {pid} is no longer available: {reason}")]
    ProcessUnavailable { pid: u32, reason: String },

    #[error("Failed to signal process {pid}: {message}")]
    SignalFailed { pid: u32, message: String },

    #[error("Failed to terminate all {failed} process(es) matching '{name}'")]
    TerminationFailed { name: String, failed: usize },

    // Blocking invocations
    #[error("{program} did not finish within {after:?}")]
    Timeout { program: String, after: Duration },

    #[error("{operation} is not supported on {platform}")]
    PlatformUnsupported {
        operation: String,
        platform: &'static str,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unknown application id: {0} (expected nsp, evz or neurolings)")]
    InvalidAppId(String),
}

/// Result type alias for launchkit operations.
pub type Result<T> = std::result::Result<T, LaunchError>;

impl From<std::io::Error> for LaunchError {
    fn from(err: std::io::Error) -> Self {
        LaunchError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for LaunchError {
    fn from(err: serde_json::Error) -> Self {
        LaunchError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl LaunchError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        LaunchError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a "not supported here" error for the current platform.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        LaunchError::PlatformUnsupported {
            operation: operation.into(),
            platform: crate::platform::current_platform(),
        }
    }

    /// Map to the coarse error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LaunchError::PathNotSet
            | LaunchError::FileNotFound(_)
            | LaunchError::WrongExtension { .. } => ErrorKind::InvalidTarget,

            LaunchError::TargetNotExecutable { .. } => ErrorKind::TargetNotExecutable,

            LaunchError::LaunchFailed { .. } => ErrorKind::LaunchFailed,

            LaunchError::ProcessNotFound { .. } | LaunchError::ProcessUnavailable { .. } => {
                ErrorKind::NotFound
            }

            LaunchError::SignalFailed { .. } | LaunchError::TerminationFailed { .. } => {
                ErrorKind::TerminationFailed
            }

            LaunchError::Timeout { .. } => ErrorKind::Timeout,

            LaunchError::PlatformUnsupported { .. } => ErrorKind::PlatformUnsupported,

            LaunchError::Io { .. } => ErrorKind::Io,

            LaunchError::Json { .. } | LaunchError::Config { .. } | LaunchError::InvalidAppId(_) => {
                ErrorKind::Config
            }
        }
    }

    /// Check if the caller may reasonably try the same call again.
    ///
    /// Nothing is retried automatically; this only informs the front end.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LaunchError::Timeout { .. }
                | LaunchError::ProcessUnavailable { .. }
                | LaunchError::LaunchFailed { .. }
        )
    }
}
