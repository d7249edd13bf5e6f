//! Raw archive identity resolution.
//!
//! # Design
//! - `resolve_archive` is a pure function over a registry snapshot: it never
//!   mutates, so allocation is reproducible from the same state and call sequence.
//! - `ArchiveResolver` performs resolve-then-register while holding the
//!   raw-archive write lock; two references resolved back to back can never be
//!   handed the same freshly minted id.
//! - By-key misses are fatal configuration errors. By-path misses allocate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::model::ArchiveSlot;
use crate::registry::ServingRegistry;

/// URL scheme style documents use to point at raw archives.
pub const ARCHIVE_URL_SCHEME: &str = "mbtiles://";

/// Character appended to a candidate id while it collides with a distinct archive.
pub const DISAMBIGUATION_SUFFIX: char = '_';

/// How a style document refers to a raw archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArchiveReference {
    /// An archive already registered under this key.
    Key(String),
    /// An archive file; structural equality on the resolved path.
    Path(PathBuf),
}

/// Outcome of resolving one reference against a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The reference maps onto an entry that already exists.
    Existing(String),
    /// No entry matched; register `path` under `id`.
    Allocate {
        /// Collision-free id for the new entry.
        id: String,
        /// Archive file backing the new entry.
        path: PathBuf,
    },
}

/// Result of [`ArchiveResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArchive {
    /// Canonical raw-archive id.
    pub id: String,
    /// Archive file backing the entry.
    pub path: PathBuf,
    /// Whether this call registered a new slot.
    pub allocated: bool,
}

/// Map an archive reference onto a canonical id within `archives`.
///
/// # Errors
///
/// Returns [`CoreError::UnknownArchiveKey`] when a by-key reference names no entry
/// and [`CoreError::ArchivePathWithoutStem`] when a path has no file stem.
pub fn resolve_archive(
    reference: &ArchiveReference,
    archives: &IndexMap<String, ArchiveSlot>,
) -> CoreResult<Resolution> {
    match reference {
        ArchiveReference::Key(key) => {
            if archives.contains_key(key) {
                Ok(Resolution::Existing(key.clone()))
            } else {
                Err(CoreError::UnknownArchiveKey { key: key.clone() })
            }
        }
        ArchiveReference::Path(path) => {
            if let Some((id, _)) = archives.iter().find(|(_, slot)| slot.path == *path) {
                return Ok(Resolution::Existing(id.clone()));
            }
            let mut candidate = stem_of(path)?;
            // Any occupant at this point has a different path; the lookup above
            // already returned for an equal one.
            while archives.contains_key(&candidate) {
                candidate.push(DISAMBIGUATION_SUFFIX);
            }
            Ok(Resolution::Allocate {
                id: candidate,
                path: path.clone(),
            })
        }
    }
}

fn stem_of(path: &Path) -> CoreResult<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| CoreError::ArchivePathWithoutStem {
            path: path.to_path_buf(),
        })
}

/// Parse a style-document source URL into an archive reference.
///
/// `mbtiles://{key}` (braces required) names a registered archive; anything else
/// is a file relative to `archives_root`. Other schemes yield `None`.
#[must_use]
pub fn parse_archive_url(url: &str, archives_root: &Path) -> Option<ArchiveReference> {
    let rest = url.strip_prefix(ARCHIVE_URL_SCHEME)?.trim();
    if rest.is_empty() {
        return None;
    }
    if let Some(key) = rest.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
        let key = key.trim();
        return (!key.is_empty()).then(|| ArchiveReference::Key(key.to_string()));
    }
    let relative = Path::new(rest);
    let path = if relative.is_absolute() {
        relative.to_path_buf()
    } else {
        archives_root.join(relative)
    };
    Some(ArchiveReference::Path(path))
}

/// Resolver bound to one generation's registry.
#[derive(Debug, Clone)]
pub struct ArchiveResolver {
    registry: Arc<ServingRegistry>,
}

impl ArchiveResolver {
    /// Bind a resolver to the supplied registry.
    #[must_use]
    pub const fn new(registry: Arc<ServingRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve a reference, registering a pending slot when a new id is allocated.
    ///
    /// # Errors
    ///
    /// Propagates [`resolve_archive`] failures; the registry is left untouched.
    pub fn resolve(&self, reference: &ArchiveReference) -> CoreResult<ResolvedArchive> {
        let mut archives = self.registry.archives.write();
        match resolve_archive(reference, &archives)? {
            Resolution::Existing(id) => {
                let path = archives
                    .get(&id)
                    .map(|slot| slot.path.clone())
                    .unwrap_or_default();
                debug!(id = %id, path = %path.display(), "archive reference reused existing id");
                Ok(ResolvedArchive {
                    id,
                    path,
                    allocated: false,
                })
            }
            Resolution::Allocate { id, path } => {
                archives.insert(id.clone(), ArchiveSlot::referenced(path.clone()));
                debug!(id = %id, path = %path.display(), "archive reference allocated id");
                Ok(ResolvedArchive {
                    id,
                    path,
                    allocated: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SlotOrigin;

    fn path_ref(path: &str) -> ArchiveReference {
        ArchiveReference::Path(PathBuf::from(path))
    }

    #[test]
    fn same_path_collapses_onto_one_id() {
        let registry = ServingRegistry::shared();
        let resolver = ArchiveResolver::new(Arc::clone(&registry));

        let first = resolver.resolve(&path_ref("/tiles/world.mbtiles")).expect("first");
        let second = resolver.resolve(&path_ref("/tiles/world.mbtiles")).expect("second");

        assert_eq!(first.id, "world");
        assert!(first.allocated);
        assert_eq!(second.id, "world");
        assert!(!second.allocated);
        assert_eq!(registry.archives.len(), 1);
    }

    #[test]
    fn colliding_stems_get_one_suffix_each() {
        let registry = ServingRegistry::shared();
        let resolver = ArchiveResolver::new(Arc::clone(&registry));

        let ids: Vec<String> = ["/a/world.mbtiles", "/b/world.mbtiles", "/c/world.mbtiles"]
            .iter()
            .map(|path| resolver.resolve(&path_ref(path)).expect("resolves").id)
            .collect();
        assert_eq!(ids, ["world", "world_", "world__"]);

        // Idempotent for the generation: re-resolving keeps the allocated ids.
        let again = resolver.resolve(&path_ref("/b/world.mbtiles")).expect("again");
        assert_eq!(again.id, "world_");
        assert_eq!(registry.archives.len(), 3);
    }

    #[test]
    fn configured_slots_take_priority_over_stems() {
        let mut snapshot = IndexMap::new();
        snapshot.insert(
            "world".to_string(),
            ArchiveSlot::configured(PathBuf::from("/configured/planet.mbtiles")),
        );

        let by_path = resolve_archive(&path_ref("/configured/planet.mbtiles"), &snapshot)
            .expect("matches configured path");
        assert_eq!(by_path, Resolution::Existing("world".into()));

        let fresh = resolve_archive(&path_ref("/other/world.mbtiles"), &snapshot)
            .expect("allocates");
        assert_eq!(
            fresh,
            Resolution::Allocate {
                id: "world_".into(),
                path: PathBuf::from("/other/world.mbtiles"),
            }
        );
        // Pure: the snapshot is untouched.
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn unknown_key_is_an_error_and_registers_nothing() {
        let registry = ServingRegistry::shared();
        let resolver = ArchiveResolver::new(Arc::clone(&registry));
        let err = resolver
            .resolve(&ArchiveReference::Key("missing".into()))
            .expect_err("unknown key");
        assert!(matches!(err, CoreError::UnknownArchiveKey { ref key } if key == "missing"));
        assert!(registry.archives.is_empty());
    }

    #[test]
    fn known_key_returns_its_path() {
        let registry = ServingRegistry::shared();
        registry
            .archives
            .set("osm", ArchiveSlot::configured(PathBuf::from("/tiles/osm.mbtiles")));
        let resolved = ArchiveResolver::new(Arc::clone(&registry))
            .resolve(&ArchiveReference::Key("osm".into()))
            .expect("known key");
        assert_eq!(resolved.path, PathBuf::from("/tiles/osm.mbtiles"));
        assert!(!resolved.allocated);
        assert_eq!(
            registry.archives.get("osm").map(|slot| slot.origin),
            Some(SlotOrigin::Configured)
        );
    }

    #[test]
    fn path_without_stem_is_rejected() {
        let err = resolve_archive(&path_ref("/"), &IndexMap::new()).expect_err("no stem");
        assert!(matches!(err, CoreError::ArchivePathWithoutStem { .. }));
    }

    #[test]
    fn archive_urls_parse_into_keys_and_paths() {
        let root = Path::new("/srv/tiles");
        assert_eq!(
            parse_archive_url("mbtiles://{osm}", root),
            Some(ArchiveReference::Key("osm".into()))
        );
        assert_eq!(
            parse_archive_url("mbtiles://osm", root),
            Some(path_ref("/srv/tiles/osm"))
        );
        assert_eq!(parse_archive_url("mbtiles://{}", root), None);
        assert_eq!(
            parse_archive_url("mbtiles://europe/world.mbtiles", root),
            Some(path_ref("/srv/tiles/europe/world.mbtiles"))
        );
        assert_eq!(
            parse_archive_url("mbtiles://world.mbtiles", root),
            Some(path_ref("/srv/tiles/world.mbtiles"))
        );
        assert_eq!(parse_archive_url("https://example.com/tiles.json", root), None);
        assert_eq!(parse_archive_url("mbtiles://", root), None);
    }
}
