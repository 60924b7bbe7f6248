//! Error types for the script runner
//!
//! Only launch and configuration failures ever reach the user. Everything that
//! can go wrong while a run is being observed (a child exiting between two
//! ticks, a helper process hanging) is modelled as [`ProbeError`] and absorbed
//! where it happens.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures that stop a run from starting.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// A required path (terminal executable on Windows) is unset or invalid
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The script itself cannot be launched
    #[error("Invalid script {}: {reason}", path.display())]
    InvalidScript { path: PathBuf, reason: String },

    /// The OS refused to create the process
    #[error("Failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    pub fn configuration(message: impl Into<String>) -> Self {
        LaunchError::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_script(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        LaunchError::InvalidScript {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            LaunchError::Configuration { .. } => ErrorCategory::Configuration,
            LaunchError::InvalidScript { .. } | LaunchError::Spawn { .. } => ErrorCategory::Launch,
        }
    }

    /// Message shown to the user when a run cannot start
    pub fn user_message(&self) -> String {
        match self {
            LaunchError::Configuration { message } => {
                format!("Configuration problem: {}", message)
            }
            LaunchError::InvalidScript { path, reason } => {
                format!("Cannot run {}: {}", path.display(), reason)
            }
            LaunchError::Spawn { command, source } => {
                format!("Could not start `{}`: {}", command, source)
            }
        }
    }
}

/// Irregularities observed while inspecting or stopping a running tree.
///
/// These never leave the tick path; callers log them and continue with
/// whatever data they already have.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Process {0} no longer exists or is not accessible")]
    ProcessLookup(u32),

    #[error("{helper} did not finish within {}ms", timeout.as_millis())]
    EnumerationTimeout { helper: String, timeout: Duration },

    #[error("{helper} is unavailable: {source}")]
    HelperUnavailable {
        helper: String,
        #[source]
        source: io::Error,
    },

    #[error("Total system memory could not be read")]
    SystemMetricsUnavailable,
}

impl ProbeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProbeError::ProcessLookup(_) => ErrorCategory::ProcessLookup,
            ProbeError::EnumerationTimeout { .. } | ProbeError::HelperUnavailable { .. } => {
                ErrorCategory::Enumeration
            }
            ProbeError::SystemMetricsUnavailable => ErrorCategory::SystemMetrics,
        }
    }
}

/// Persisted settings could not be read or written.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings file error ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Settings file is not valid JSON ({}): {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot determine a settings directory")]
    NoConfigDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Launch,
    ProcessLookup,
    Enumeration,
    SystemMetrics,
}

impl ErrorCategory {
    /// Whether errors of this category are shown to the user
    pub fn is_user_visible(&self) -> bool {
        matches!(self, ErrorCategory::Configuration | ErrorCategory::Launch)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Launch => "launch",
            ErrorCategory::ProcessLookup => "process_lookup",
            ErrorCategory::Enumeration => "enumeration",
            ErrorCategory::SystemMetrics => "system_metrics",
        };
        f.write_str(name)
    }
}

pub type LaunchResult<T> = Result<T, LaunchError>;
