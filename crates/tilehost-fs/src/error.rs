//! # Design
//!
//! - Structured, constant-message errors for the filesystem collaborators.
//! - Capture the operation and path so startup failures name the offending file.
//! - Collaborator traits return `anyhow`; these errors convert into it unchanged.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for filesystem collaborators.
pub type FsResult<T> = Result<T, FsError>;

/// Errors produced while reading styles, fonts or archives.
#[derive(Debug, Error)]
pub enum FsError {
    /// IO failures while reading from disk.
    #[error("filesystem io failure")]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// JSON documents that do not parse.
    #[error("json document is malformed")]
    Json {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path of the document.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Style documents that parse but have an unusable shape.
    #[error("style document is invalid")]
    InvalidStyle {
        /// Path of the document.
        path: PathBuf,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// SQLite failures while reading an archive.
    #[error("archive database failure")]
    Database {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Archive file.
        path: PathBuf,
        /// Underlying database error.
        source: sqlx::Error,
    },
    /// The post-process hook could not be run.
    #[error("post-process hook failed to run")]
    HookSpawn {
        /// Hook executable.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The post-process hook exited unsuccessfully.
    #[error("post-process hook exited with failure")]
    HookStatus {
        /// Hook executable.
        path: PathBuf,
        /// Exit code when the hook was not killed by a signal.
        code: Option<i32>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn io_errors_keep_context_out_of_the_message() {
        let err = FsError::Io {
            operation: "style.read",
            path: PathBuf::from("/styles/basic.json"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(err.to_string(), "filesystem io failure");
        assert!(err.source().is_some());
        let wrapped = anyhow::Error::from(err);
        assert!(wrapped.downcast_ref::<FsError>().is_some());
    }
}
