//! Configuration sources.
//!
//! # Design
//! - `ConfigSource` is the seam the reload controller pulls a fresh snapshot from
//!   at the start of every generation; nothing is cached between calls.
//! - `FileConfigSource` re-reads its document on every `load` and validates roots,
//!   so a reload observes edits and fails the same way process startup does.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::model::{ConfigDocument, ServerConfig};
use crate::validate::validate_paths;

/// Source of validated configuration snapshots.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Load and validate a fresh configuration snapshot.
    async fn load(&self) -> ConfigResult<ServerConfig>;
}

/// Configuration document stored on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    /// Build a source reading the supplied document path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the configuration document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn base_dir(&self) -> PathBuf {
        self.path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn load(&self) -> ConfigResult<ServerConfig> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| ConfigError::Read {
                path: self.path.clone(),
                source,
            })?;
        let document: ConfigDocument =
            serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
                path: Some(self.path.clone()),
                source,
            })?;
        let config = ServerConfig::resolve(document, &self.base_dir());
        validate_paths(&config.options.paths).await?;
        info!(
            path = %self.path.display(),
            styles = config.styles.len(),
            archives = config.archives.len(),
            "configuration loaded"
        );
        Ok(config)
    }
}

/// Parse and resolve an in-memory document without touching the filesystem.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] when the bytes are not a valid document.
pub fn parse_config(bytes: &[u8], base_dir: &Path) -> ConfigResult<ServerConfig> {
    let document: ConfigDocument =
        serde_json::from_slice(bytes).map_err(|source| ConfigError::Parse { path: None, source })?;
    debug!(base = %base_dir.display(), "parsed inline configuration");
    Ok(ServerConfig::resolve(document, base_dir))
}
