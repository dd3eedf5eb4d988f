//! Error handling module for dockstrap
//!
//! Provides the typed errors raised by the installer building blocks.
//! Orchestration code wraps these in `anyhow` with step context.

use thiserror::Error;

/// Main error type for dockstrap
#[derive(Error, Debug)]
pub enum InstallerError {
    /// IO errors (keyring directory, source list, os-release)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An external command could not be spawned or exited non-zero
    #[error("`{command}` failed (exit code {code}): {stderr}")]
    Command {
        command: String,
        code: i32,
        stderr: String,
    },

    /// Host is not a Debian-family system or lacks required tooling
    #[error("Unsupported system: {0}")]
    UnsupportedSystem(String),

    /// None of the candidate codenames has a reachable repository
    #[error("No reachable Docker repository for any codename (tried: {})", tried.join(", "))]
    NoReachableRepository { tried: Vec<String> },

    /// Install stage transition errors
    #[error("Install transition error: {0}")]
    InstallTransition(String),
}

/// Result type alias for installer operations
pub type Result<T> = std::result::Result<T, InstallerError>;

impl InstallerError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an unsupported-system error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedSystem(msg.into())
    }

    /// Create an install transition error
    pub fn install_transition(msg: impl Into<String>) -> Self {
        Self::InstallTransition(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InstallerError::config("empty package list");
        assert_eq!(err.to_string(), "Configuration error: empty package list");

        let err = InstallerError::Command {
            command: "apt-get install -y curl".to_string(),
            code: 100,
            stderr: "E: Unable to locate package".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "`apt-get install -y curl` failed (exit code 100): E: Unable to locate package"
        );
    }

    #[test]
    fn test_no_reachable_repository_lists_candidates() {
        let err = InstallerError::NoReachableRepository {
            tried: vec!["oracular".into(), "noble".into(), "jammy".into()],
        };
        assert!(err.to_string().contains("oracular, noble, jammy"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: InstallerError = io_err.into();
        assert!(matches!(err, InstallerError::Io(_)));
    }
}
