//! Command-line arguments.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use tilehost_config::defaults::{DEFAULT_CONFIG_FILE, ENV_CONFIG};
use tilehost_config::{BindSettings, ConfigResult, apply_env_overrides};

/// Serve map styles, raw tile archives and fonts over HTTP.
#[derive(Debug, Clone, Parser)]
#[command(name = "tilehost", version, about)]
pub struct Cli {
    /// Configuration document.
    #[arg(short, long, env = ENV_CONFIG, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Interface to bind; `TILEHOST_BIND` takes precedence.
    #[arg(short, long)]
    pub bind: Option<IpAddr>,

    /// Port to listen on; `TILEHOST_PORT` takes precedence.
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Log at debug level.
    #[arg(long, conflicts_with = "silent")]
    pub verbose: bool,

    /// Log warnings and errors only.
    #[arg(long)]
    pub silent: bool,
}

impl Cli {
    /// Listener settings: defaults, then flags, then environment overrides.
    ///
    /// `TILEHOST_BIND` and `TILEHOST_PORT` win over `--bind` and `--port`.
    ///
    /// # Errors
    ///
    /// Returns [`tilehost_config::ConfigError::InvalidEnv`] when an environment
    /// override is unusable.
    pub fn bind_settings<F>(&self, lookup: F) -> ConfigResult<BindSettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = BindSettings::default();
        if let Some(addr) = self.bind {
            settings.addr = addr;
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        apply_env_overrides(settings, lookup)
    }
}
