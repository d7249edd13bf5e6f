//! # Design
//!
//! - Centralize application-level errors for bootstrap and the reload loop.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: tilehost_config::ConfigError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: tilehost_api::ApiServerError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: tilehost_telemetry::TelemetryError,
    },
    /// A generation failed to become ready.
    #[error("generation startup failed")]
    Startup {
        /// Generation number that failed.
        generation: u64,
        /// Source readiness error.
        source: tilehost_core::CoreError,
    },
    /// Installing a process signal handler failed.
    #[error("signal handler installation failed")]
    Signals {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: io::Error,
    },
    /// A generation's server task panicked or was cancelled.
    #[error("server task did not complete")]
    Join {
        /// Operation identifier.
        operation: &'static str,
        /// Source join error.
        source: tokio::task::JoinError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: tilehost_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: tilehost_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: tilehost_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn signals(operation: &'static str, source: io::Error) -> Self {
        Self::Signals { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "config.load",
            tilehost_config::ConfigError::MissingPath {
                field: "fonts",
                path: PathBuf::from("/srv/fonts"),
            },
        );
        assert!(matches!(config, AppError::Config { .. }));
        assert_eq!(config.to_string(), "configuration operation failed");
        assert!(config.source().is_some());

        let api = AppError::api_server(
            "api_server.bind",
            tilehost_api::ApiServerError::Bind {
                addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
                source: io::Error::other("in use"),
            },
        );
        assert!(matches!(api, AppError::ApiServer { .. }));

        let signals = AppError::signals("signals.hangup", io::Error::other("unsupported"));
        assert!(matches!(signals, AppError::Signals { .. }));

        let startup = AppError::Startup {
            generation: 2,
            source: tilehost_core::CoreError::StartupFailed {
                reason: "archive:world: missing file".into(),
            },
        };
        assert_eq!(startup.to_string(), "generation startup failed");
    }
}
