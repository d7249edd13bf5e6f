#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::pedantic, clippy::nursery, unreachable_pub)]

//! Resource model shared by the bootstrap orchestrator and the HTTP surface.
//!
//! Layout: `kind.rs` (resource kinds and their URL namespaces), `model.rs`
//! (descriptors), `registry.rs` (per-generation serving registry), `resolver.rs`
//! (archive identity resolution), `collaborator.rs` (content provider seams),
//! `readiness.rs` (aggregate readiness signal), `urls.rs` (public URL templates).

pub mod collaborator;
pub mod error;
pub mod kind;
pub mod model;
pub mod readiness;
pub mod registry;
pub mod resolver;
pub mod urls;

pub use collaborator::{
    ArchiveCollaborator, ArchiveOutput, ArchiveRequest, Collaborators, FontCollaborator,
    FontOutput, FontRequest, Mount, RenderedCollaborator, RenderedOutput, ResolvedArchives,
    StyleCollaborator, StyleOutput, StyleRequest,
};
pub use error::{CoreError, CoreResult};
pub use kind::ResourceKind;
pub use model::{
    ArchiveDescriptor, ArchiveSlot, FontDescriptor, RenderedDescriptor, SlotOrigin,
    StyleDescriptor, TileSetInfo,
};
pub use readiness::{Readiness, ReadinessHandle, ReadinessPublisher, readiness_channel};
pub use registry::{KindRegistry, ServingRegistry};
pub use resolver::{
    ARCHIVE_URL_SCHEME, ArchiveReference, ArchiveResolver, DISAMBIGUATION_SUFFIX,
    ResolvedArchive, Resolution, parse_archive_url, resolve_archive,
};
pub use urls::{KeyQuery, key_suffix, request_base_url, tile_extension, tile_url_template};
