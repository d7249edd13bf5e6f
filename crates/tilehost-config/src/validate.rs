//! Validation helpers for resolved configuration and environment overrides.

use std::io::ErrorKind;
use std::net::IpAddr;

use crate::defaults::{ENV_BIND, ENV_PORT};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{BindSettings, ResolvedPaths};

/// Ensure every configured root directory exists.
///
/// # Errors
///
/// Returns [`ConfigError::MissingPath`] for the first absent root,
/// [`ConfigError::NotADirectory`] when a root is a file, or
/// [`ConfigError::Io`] when the filesystem cannot be inspected.
pub async fn validate_paths(paths: &ResolvedPaths) -> ConfigResult<()> {
    for (field, path) in paths.entries() {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(ConfigError::NotADirectory {
                    field,
                    path: path.to_path_buf(),
                });
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ConfigError::MissingPath {
                    field,
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    operation: "validate_paths.metadata",
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }
    Ok(())
}

/// Parse a TCP port, rejecting zero.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnv`] when the value is not a port in `1..=65535`.
pub fn parse_port(name: &'static str, value: &str) -> ConfigResult<u16> {
    let port = value
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidEnv {
            name,
            value: value.to_string(),
            reason: "not_a_port",
        })?;
    if port == 0 {
        return Err(ConfigError::InvalidEnv {
            name,
            value: value.to_string(),
            reason: "zero",
        });
    }
    Ok(port)
}

/// Parse an interface address.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnv`] when the value is not an IP address.
pub fn parse_bind_addr(name: &'static str, value: &str) -> ConfigResult<IpAddr> {
    value
        .trim()
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::InvalidEnv {
            name,
            value: value.to_string(),
            reason: "not_an_ip_address",
        })
}

/// Apply `TILEHOST_BIND` / `TILEHOST_PORT` on top of the supplied settings.
///
/// `lookup` abstracts the environment so callers and tests can inject values.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnv`] when an override is present but unusable.
pub fn apply_env_overrides<F>(mut settings: BindSettings, lookup: F) -> ConfigResult<BindSettings>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_BIND).filter(|v| !v.trim().is_empty()) {
        settings.addr = parse_bind_addr(ENV_BIND, &value)?;
    }
    if let Some(value) = lookup(ENV_PORT).filter(|v| !v.trim().is_empty()) {
        settings.port = parse_port(ENV_PORT, &value)?;
    }
    Ok(settings)
}
