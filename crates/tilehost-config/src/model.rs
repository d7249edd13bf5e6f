//! Typed configuration models.
//!
//! # Design
//! - `*Document` types mirror the on-disk JSON exactly (camelCase, optional keys).
//! - `ServerConfig` is the resolved, immutable snapshot handed to one generation:
//!   every path is absolute (or root-relative) and every default is applied.
//! - Map order is preserved so startup work is initiated in configuration order.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::defaults::{DEFAULT_BIND_ADDR, DEFAULT_PORT};

/// Raw configuration document as stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    /// Global options (roots, aliases, front page, hooks).
    #[serde(default)]
    pub options: OptionsDocument,
    /// Style id to style entry, in declaration order.
    #[serde(default)]
    pub styles: IndexMap<String, StyleSpec>,
    /// Raw archive id to archive entry, in declaration order.
    #[serde(default, alias = "data")]
    pub archives: IndexMap<String, ArchiveSpec>,
}

/// `options` block of the configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsDocument {
    /// Root directories for each resource kind.
    #[serde(default)]
    pub paths: PathsDocument,
    /// Extension aliases applied to generated tile URLs.
    #[serde(default)]
    pub tile_alias: Option<TileAlias>,
    /// `false` disables the front page; a string names a custom page file.
    #[serde(default)]
    pub front_page: Option<FrontPageSetting>,
    /// Executable applied to every raw archive tile before it is returned.
    #[serde(default)]
    pub archive_post_process_hook: Option<PathBuf>,
    /// Base URL used instead of the request host when expanding tile URLs.
    #[serde(default)]
    pub public_url: Option<String>,
    /// Serve every catalogued font instead of only those used by styles.
    #[serde(default)]
    pub serve_all_fonts: bool,
}

/// `options.paths` block of the configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathsDocument {
    /// Base directory; defaults to the directory containing the config file.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Style documents directory, relative to `root`.
    #[serde(default)]
    pub styles: Option<PathBuf>,
    /// Font catalog directory, relative to `root`.
    #[serde(default)]
    pub fonts: Option<PathBuf>,
    /// Sprite directory, relative to `root`.
    #[serde(default)]
    pub sprites: Option<PathBuf>,
    /// Raw tile archive directory, relative to `root`.
    #[serde(default, alias = "mbtiles")]
    pub archives: Option<PathBuf>,
}

/// Extension aliases for generated tile URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileAlias {
    /// Extension used in place of `pbf` for vector tiles.
    #[serde(default)]
    pub pbf: Option<String>,
}

/// Front page setting as written in the document (`false` or a path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrontPageSetting {
    /// `true` keeps the built-in page, `false` disables it.
    Toggle(bool),
    /// Custom page file, relative to `root`.
    Path(PathBuf),
}

/// Style entry as written in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSpec {
    /// Style document reference, relative to `paths.styles`.
    pub style: PathBuf,
    /// Also serve the archive-backed tile namespace for this style.
    #[serde(default = "default_true")]
    pub serve_archive: bool,
    /// Also serve rendered raster/vector tiles for this style.
    #[serde(default = "default_true")]
    pub serve_rendered: bool,
}

/// Raw archive entry as written in the document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveSpec {
    /// Archive file, relative to `paths.archives`. May be empty (entry is skipped).
    #[serde(default, alias = "mbtiles")]
    pub path: String,
}

const fn default_true() -> bool {
    true
}

/// Resolved configuration snapshot for one generation.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Resolved global options.
    pub options: ServerOptions,
    /// Resolved styles in configuration order.
    pub styles: IndexMap<String, StyleEntry>,
    /// Resolved raw archives in configuration order.
    pub archives: IndexMap<String, ArchiveEntry>,
}

/// Resolved global options.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Resolved root directories.
    pub paths: ResolvedPaths,
    /// Extension aliases for generated tile URLs.
    pub tile_alias: TileAlias,
    /// Front page behaviour.
    pub front_page: FrontPage,
    /// Resolved post-process hook executable.
    pub archive_post_process_hook: Option<PathBuf>,
    /// Base URL override for generated tile URLs (no trailing slash).
    pub public_url: Option<String>,
    /// Serve every catalogued font instead of only those used by styles.
    pub serve_all_fonts: bool,
}

/// Root directories after resolution against `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    /// Base directory.
    pub root: PathBuf,
    /// Style documents directory.
    pub styles: PathBuf,
    /// Font catalog directory.
    pub fonts: PathBuf,
    /// Sprite directory.
    pub sprites: PathBuf,
    /// Raw tile archive directory.
    pub archives: PathBuf,
}

impl ResolvedPaths {
    /// Every root directory paired with its option key, in validation order.
    #[must_use]
    pub fn entries(&self) -> [(&'static str, &Path); 5] {
        [
            ("root", self.root.as_path()),
            ("styles", self.styles.as_path()),
            ("fonts", self.fonts.as_path()),
            ("sprites", self.sprites.as_path()),
            ("archives", self.archives.as_path()),
        ]
    }
}

/// Front page behaviour after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontPage {
    /// Built-in listing page.
    Builtin,
    /// No front page; `/` answers 404.
    Disabled,
    /// Custom page file served verbatim.
    File(PathBuf),
}

/// Resolved style entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleEntry {
    /// Resolved style document path.
    pub document: PathBuf,
    /// Also serve the archive-backed tile namespace for this style.
    pub serve_archive: bool,
    /// Also serve rendered tiles for this style.
    pub serve_rendered: bool,
}

/// Resolved raw archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Resolved archive path; empty when the document left it blank.
    pub path: PathBuf,
}

impl ArchiveEntry {
    /// Whether the entry names no archive file at all.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

impl ServerConfig {
    /// Resolve a raw document against the directory that contained it.
    #[must_use]
    pub fn resolve(document: ConfigDocument, base_dir: &Path) -> Self {
        let ConfigDocument {
            options,
            styles,
            archives,
        } = document;

        let root = options
            .paths
            .root
            .as_deref()
            .map_or_else(|| base_dir.to_path_buf(), |root| join(base_dir, root));
        let under_root = |value: Option<&Path>| value.map_or_else(|| root.clone(), |p| join(&root, p));
        let paths = ResolvedPaths {
            styles: under_root(options.paths.styles.as_deref()),
            fonts: under_root(options.paths.fonts.as_deref()),
            sprites: under_root(options.paths.sprites.as_deref()),
            archives: under_root(options.paths.archives.as_deref()),
            root: root.clone(),
        };

        let front_page = match options.front_page {
            None | Some(FrontPageSetting::Toggle(true)) => FrontPage::Builtin,
            Some(FrontPageSetting::Toggle(false)) => FrontPage::Disabled,
            Some(FrontPageSetting::Path(path)) => FrontPage::File(join(&root, &path)),
        };

        let styles = styles
            .into_iter()
            .map(|(id, entry)| {
                let style = StyleEntry {
                    document: join(&paths.styles, &entry.style),
                    serve_archive: entry.serve_archive,
                    serve_rendered: entry.serve_rendered,
                };
                (id, style)
            })
            .collect();

        let archives = archives
            .into_iter()
            .map(|(id, entry)| {
                let trimmed = entry.path.trim();
                let path = if trimmed.is_empty() {
                    PathBuf::new()
                } else {
                    join(&paths.archives, Path::new(trimmed))
                };
                (id, ArchiveEntry { path })
            })
            .collect();

        Self {
            options: ServerOptions {
                tile_alias: options.tile_alias.unwrap_or_default(),
                front_page,
                archive_post_process_hook: options
                    .archive_post_process_hook
                    .map(|hook| join(&root, &hook)),
                public_url: options
                    .public_url
                    .map(|url| url.trim_end_matches('/').to_string())
                    .filter(|url| !url.is_empty()),
                serve_all_fonts: options.serve_all_fonts,
                paths,
            },
            styles,
            archives,
        }
    }
}

fn join(base: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base.join(value)
    }
}

/// Listener address for one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindSettings {
    /// Interface address.
    pub addr: IpAddr,
    /// TCP port.
    pub port: u16,
}

impl Default for BindSettings {
    fn default() -> Self {
        Self {
            addr: DEFAULT_BIND_ADDR,
            port: DEFAULT_PORT,
        }
    }
}

impl BindSettings {
    /// Socket address the listener binds to.
    #[must_use]
    pub const fn socket_addr(self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}
