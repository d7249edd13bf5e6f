//! Default names and fallbacks for configuration loading.
//!
//! # Design
//! - Centralize environment variable names so the CLI and loader agree.
//! - Keep bind defaults explicit for auditability.

use std::net::{IpAddr, Ipv4Addr};

/// Configuration file read when no path is supplied.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";
/// Port the HTTP listener binds to by default.
pub const DEFAULT_PORT: u16 = 8080;
/// Address the HTTP listener binds to by default.
pub const DEFAULT_BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
/// Environment variable overriding the configuration file path.
pub const ENV_CONFIG: &str = "TILEHOST_CONFIG";
/// Environment variable overriding the bind port.
pub const ENV_PORT: &str = "TILEHOST_PORT";
/// Environment variable overriding the bind address.
pub const ENV_BIND: &str = "TILEHOST_BIND";
