#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::pedantic, clippy::nursery, unreachable_pub)]

//! File-backed configuration for the tile host.
//!
//! Layout: `model.rs` (document and resolved models), `validate.rs`
//! (path and bind validation), `loader.rs` (`ConfigSource` + file loader),
//! `defaults.rs` (well-known names and fallbacks).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigSource, FileConfigSource, parse_config};
pub use model::{
    ArchiveEntry, ArchiveSpec, BindSettings, ConfigDocument, FrontPage, FrontPageSetting,
    OptionsDocument, PathsDocument, ResolvedPaths, ServerConfig, ServerOptions, StyleEntry,
    StyleSpec, TileAlias,
};
pub use validate::{apply_env_overrides, parse_bind_addr, parse_port, validate_paths};
