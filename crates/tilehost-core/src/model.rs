//! Descriptors stored in the serving registry.
//!
//! # Design
//! - Pure data carriers; collaborators produce them, the HTTP surface reads them.
//! - Raw archives get a slot before their metadata exists so the identity resolver
//!   can reserve ids; listings only expose slots whose descriptor is present.

use std::path::PathBuf;

use serde::Serialize;

/// Metadata shared by every tile set (raw archive or rendered style).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileSetInfo {
    /// Human readable name.
    pub name: String,
    /// Tile format (`png`, `jpg`, `webp`, `pbf`).
    pub format: String,
    /// Default view as `[lon, lat, zoom]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<[f64; 3]>,
    /// Extent as `[west, south, east, north]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<[f64; 4]>,
    /// Lowest zoom level served.
    pub minzoom: u8,
    /// Highest zoom level served.
    pub maxzoom: u8,
    /// Attribution HTML, when the source declares one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
}

impl TileSetInfo {
    /// Info with only a name and format; zoom range defaults to `0..=22`.
    #[must_use]
    pub fn named(name: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            center: None,
            bounds: None,
            minzoom: 0,
            maxzoom: 22,
            attribution: None,
        }
    }
}

/// A served style document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleDescriptor {
    /// Style name taken from the document, falling back to the id.
    pub name: String,
    /// Document schema version.
    pub version: u32,
    /// Whether rendered tiles are served for this style.
    pub serve_rendered: bool,
}

/// Rendered tiles served for a style.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedDescriptor {
    /// Tile set metadata.
    #[serde(flatten)]
    pub info: TileSetInfo,
    /// Declared tile edge in pixels.
    pub tile_size: u16,
}

/// A raw archive after its startup task completed.
pub type ArchiveDescriptor = TileSetInfo;

/// How a raw archive slot came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotOrigin {
    /// Declared in the configuration `archives` map.
    Configured,
    /// Allocated by the identity resolver for a style reference.
    Referenced,
}

/// Raw archive registry entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveSlot {
    /// Archive file backing the entry.
    pub path: PathBuf,
    /// How the slot was created.
    pub origin: SlotOrigin,
    /// Metadata, present once the archive's startup task resolved.
    pub descriptor: Option<ArchiveDescriptor>,
}

impl ArchiveSlot {
    /// Slot declared in configuration, metadata pending.
    #[must_use]
    pub const fn configured(path: PathBuf) -> Self {
        Self {
            path,
            origin: SlotOrigin::Configured,
            descriptor: None,
        }
    }

    /// Slot allocated for a style reference, metadata pending.
    #[must_use]
    pub const fn referenced(path: PathBuf) -> Self {
        Self {
            path,
            origin: SlotOrigin::Referenced,
            descriptor: None,
        }
    }

    /// Whether the archive's startup task has resolved.
    #[must_use]
    pub const fn is_served(&self) -> bool {
        self.descriptor.is_some()
    }
}

/// A font known to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontDescriptor {
    /// Font family name (directory name in the catalog).
    pub name: String,
}
