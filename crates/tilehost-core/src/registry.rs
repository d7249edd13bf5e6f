//! Per-generation serving registry.
//!
//! # Design
//! - One insertion-ordered map per resource kind; ids are unique within a kind only.
//! - A registry instance belongs to exactly one generation and is dropped with it;
//!   nothing here is a process-wide singleton.
//! - No deletion API: entries are written once as startup tasks complete and are
//!   read by request handlers that guard on presence.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use crate::model::{ArchiveSlot, FontDescriptor, RenderedDescriptor, StyleDescriptor};

/// Insertion-ordered map from id to descriptor for one resource kind.
#[derive(Debug)]
pub struct KindRegistry<D> {
    entries: RwLock<IndexMap<String, D>>,
}

impl<D> Default for KindRegistry<D> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
        }
    }
}

impl<D: Clone> KindRegistry<D> {
    /// Look up a descriptor by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<D> {
        self.read().get(id).cloned()
    }

    /// Whether an entry exists for `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    /// Store a descriptor, returning the value it replaced.
    pub fn set(&self, id: impl Into<String>, descriptor: D) -> Option<D> {
        self.write().insert(id.into(), descriptor)
    }

    /// Store a descriptor unless the id is already taken. Returns whether it was stored.
    pub fn set_if_absent(&self, id: impl Into<String>, descriptor: D) -> bool {
        let mut entries = self.write();
        let id = id.into();
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(id, descriptor);
        true
    }

    /// Mutate an existing entry in place. Returns whether the id was present.
    pub fn update(&self, id: &str, apply: impl FnOnce(&mut D)) -> bool {
        self.write().get_mut(id).map(apply).is_some()
    }

    /// Every entry in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<(String, D)> {
        self.read()
            .iter()
            .map(|(id, descriptor)| (id.clone(), descriptor.clone()))
            .collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl<D> KindRegistry<D> {
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, D>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, D>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The four per-kind registries of one generation.
#[derive(Debug, Default)]
pub struct ServingRegistry {
    /// Style documents.
    pub styles: KindRegistry<StyleDescriptor>,
    /// Rendered tile sets.
    pub rendered: KindRegistry<RenderedDescriptor>,
    /// Raw archive slots.
    pub archives: KindRegistry<ArchiveSlot>,
    /// Fonts.
    pub fonts: KindRegistry<FontDescriptor>,
}

impl ServingRegistry {
    /// Fresh, empty registry wrapped for sharing across tasks and handlers.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Raw archive slots whose startup task has resolved, in insertion order.
    #[must_use]
    pub fn served_archives(&self) -> Vec<(String, ArchiveSlot)> {
        self.archives
            .read()
            .iter()
            .filter(|(_, slot)| slot.is_served())
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect()
    }

    /// Look up a raw archive only once its startup task has resolved.
    #[must_use]
    pub fn served_archive(&self, id: &str) -> Option<ArchiveSlot> {
        self.archives.get(id).filter(ArchiveSlot::is_served)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TileSetInfo;
    use std::path::PathBuf;

    fn font(name: &str) -> FontDescriptor {
        FontDescriptor { name: name.into() }
    }

    #[test]
    fn list_preserves_insertion_order() {
        let registry = KindRegistry::default();
        registry.set("zeta", font("Zeta"));
        registry.set("alpha", font("Alpha"));
        registry.set("mid", font("Mid"));
        let ids: Vec<String> = registry.list().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn set_if_absent_keeps_first_writer() {
        let registry = KindRegistry::default();
        assert!(registry.set_if_absent("Noto Sans", font("first")));
        assert!(!registry.set_if_absent("Noto Sans", font("second")));
        assert_eq!(registry.get("Noto Sans"), Some(font("first")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn ids_are_scoped_per_kind() {
        let registry = ServingRegistry::default();
        registry.fonts.set("shared", font("shared"));
        registry
            .archives
            .set("shared", ArchiveSlot::configured(PathBuf::from("/a.mbtiles")));
        assert!(registry.fonts.contains("shared"));
        assert!(registry.archives.contains("shared"));
        assert!(!registry.styles.contains("shared"));
    }

    #[test]
    fn archives_are_hidden_until_served() {
        let registry = ServingRegistry::default();
        registry
            .archives
            .set("world", ArchiveSlot::configured(PathBuf::from("/world.mbtiles")));
        assert!(registry.served_archive("world").is_none());
        assert!(registry.served_archives().is_empty());

        let updated = registry.archives.update("world", |slot| {
            slot.descriptor = Some(TileSetInfo::named("World", "pbf"));
        });
        assert!(updated);
        assert!(!registry.archives.update("missing", |_| {}));
        assert_eq!(registry.served_archives().len(), 1);
        assert!(registry.served_archive("world").is_some());
    }
}
