//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document could not be read.
    #[error("failed to read configuration file")]
    Read {
        /// Path of the configuration document.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// The configuration document was not valid JSON or had the wrong shape.
    #[error("failed to parse configuration document")]
    Parse {
        /// Path of the configuration document, when loaded from disk.
        path: Option<PathBuf>,
        /// Source serde error.
        source: serde_json::Error,
    },
    /// A required root path does not exist.
    #[error("configured path does not exist")]
    MissingPath {
        /// Option key holding the path.
        field: &'static str,
        /// Resolved path that was checked.
        path: PathBuf,
    },
    /// A required root path exists but is not a directory.
    #[error("configured path is not a directory")]
    NotADirectory {
        /// Option key holding the path.
        field: &'static str,
        /// Resolved path that was checked.
        path: PathBuf,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section that failed validation.
        section: String,
        /// Field that failed validation.
        field: String,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// An environment override carried an unusable value.
    #[error("invalid environment override")]
    InvalidEnv {
        /// Environment variable name.
        name: &'static str,
        /// Raw value read from the environment.
        value: String,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Filesystem inspection failed for a reason other than absence.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
