#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::pedantic, clippy::nursery, unreachable_pub)]

//! Filesystem-backed collaborators: style documents, the font catalog and MBTiles archives.
//!
//! Rendering is not part of this crate; hosts built on it report rendered serving
//! as unsupported.

pub mod error;
pub mod fonts;
pub mod mbtiles;
pub mod style;

use std::sync::Arc;

use tilehost_core::Collaborators;

pub use error::{FsError, FsResult};
pub use fonts::FsFonts;
pub use mbtiles::FsArchives;
pub use style::FsStyles;

/// Collaborators serving content straight from the configured roots.
#[must_use]
pub fn filesystem_collaborators() -> Collaborators {
    Collaborators {
        styles: Arc::new(FsStyles::new()),
        rendered: None,
        archives: Arc::new(FsArchives::new()),
        fonts: Arc::new(FsFonts::new()),
    }
}
