//! # Design
//!
//! - One error type for resolution, collaborator and readiness failures.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Collaborator failures keep their `anyhow` chain as the source.

use std::path::PathBuf;

use thiserror::Error;

use crate::kind::ResourceKind;

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while resolving, initializing or awaiting resources.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A style referenced an archive key with no registered entry.
    #[error("referenced archive key is not registered")]
    UnknownArchiveKey {
        /// Key named by the style document.
        key: String,
    },
    /// An archive path has no file name to derive an identifier from.
    #[error("archive path has no usable file name")]
    ArchivePathWithoutStem {
        /// Offending path.
        path: PathBuf,
    },
    /// A collaborator rejected a startup task.
    #[error("startup task failed")]
    Collaborator {
        /// Kind of resource the task was producing.
        kind: ResourceKind,
        /// Task label (`style:basic`, `archive:world`, ...).
        label: String,
        /// Collaborator error chain.
        source: anyhow::Error,
    },
    /// The generation's aggregate readiness rejected.
    #[error("startup did not complete")]
    StartupFailed {
        /// Rendered reason reported by the failing task.
        reason: String,
    },
    /// The generation was dropped before readiness settled.
    #[error("startup was abandoned")]
    StartupAbandoned,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn collaborator_errors_keep_their_source() {
        let err = CoreError::Collaborator {
            kind: ResourceKind::Archive,
            label: "archive:world".into(),
            source: anyhow::anyhow!("sqlite file is corrupt"),
        };
        assert_eq!(err.to_string(), "startup task failed");
        let source = err.source().expect("source kept");
        assert_eq!(source.to_string(), "sqlite file is corrupt");
    }
}
