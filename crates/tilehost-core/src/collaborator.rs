//! Content provider seams.
//!
//! # Design
//! - Each resource kind has one async trait; the orchestrator only sees the
//!   mountable router and the descriptor a collaborator returns.
//! - Collaborators report failures through `anyhow`; the orchestrator wraps them
//!   into [`crate::CoreError::Collaborator`] with the task label.
//! - Archive references are resolved by the orchestrator before `build` runs, so
//!   collaborators never allocate ids themselves.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use tilehost_config::{ServerOptions, StyleEntry};

use crate::kind::ResourceKind;
use crate::model::{ArchiveDescriptor, RenderedDescriptor, StyleDescriptor};
use crate::registry::ServingRegistry;
use crate::resolver::ArchiveReference;

/// Router produced by a startup task, tagged with where it belongs.
#[derive(Clone)]
pub struct Mount {
    /// Kind of resource; selects the URL namespace.
    pub kind: ResourceKind,
    /// Task label, for logs.
    pub label: String,
    /// Sub-router dispatching on the id segment below the namespace.
    pub router: Router,
}

impl fmt::Debug for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mount")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl Mount {
    /// Tag a router with its kind and task label.
    #[must_use]
    pub fn new(kind: ResourceKind, label: impl Into<String>, router: Router) -> Self {
        Self {
            kind,
            label: label.into(),
            router,
        }
    }
}

/// Archive references of one style, each paired with its canonical id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedArchives {
    entries: Vec<(ArchiveReference, String)>,
}

impl ResolvedArchives {
    /// Record the id a reference resolved to.
    pub fn push(&mut self, reference: ArchiveReference, id: String) {
        self.entries.push((reference, id));
    }

    /// Canonical id for a reference, if it was resolved.
    #[must_use]
    pub fn get(&self, reference: &ArchiveReference) -> Option<&str> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == reference)
            .map(|(_, id)| id.as_str())
    }

    /// Resolved pairs in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = (&ArchiveReference, &str)> {
        self.entries.iter().map(|(reference, id)| (reference, id.as_str()))
    }

    /// Number of resolved references.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the style referenced no archives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Input for style and rendered startup tasks.
#[derive(Debug, Clone)]
pub struct StyleRequest {
    /// Style id.
    pub id: String,
    /// Resolved configuration entry.
    pub entry: StyleEntry,
    /// Global options of the generation.
    pub options: Arc<ServerOptions>,
}

/// What a style collaborator produced.
#[derive(Debug)]
pub struct StyleOutput {
    /// Descriptor recorded in the style registry.
    pub descriptor: StyleDescriptor,
    /// Font stacks the style uses; recorded in the font registry.
    pub fonts: Vec<String>,
    /// Router mounted under the style namespace.
    pub router: Router,
}

/// What a rendered collaborator produced.
#[derive(Debug)]
pub struct RenderedOutput {
    /// Descriptor recorded in the rendered registry.
    pub descriptor: RenderedDescriptor,
    /// Router mounted under the style namespace.
    pub router: Router,
}

/// Input for a raw archive startup task.
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    /// Raw archive id.
    pub id: String,
    /// Archive file.
    pub path: PathBuf,
    /// Global options of the generation.
    pub options: Arc<ServerOptions>,
}

/// What an archive collaborator produced.
#[derive(Debug)]
pub struct ArchiveOutput {
    /// Metadata stored into the archive's slot.
    pub descriptor: ArchiveDescriptor,
    /// Router mounted under the raw-archive namespace.
    pub router: Router,
}

/// Input for the font startup task.
#[derive(Debug, Clone)]
pub struct FontRequest {
    /// Global options of the generation.
    pub options: Arc<ServerOptions>,
    /// Registry of the generation; the font router reads the font map at request time.
    pub registry: Arc<ServingRegistry>,
}

/// What the font collaborator produced.
#[derive(Debug)]
pub struct FontOutput {
    /// Every font found in the catalog.
    pub catalog: Vec<String>,
    /// Router mounted under the font namespace.
    pub router: Router,
}

/// Style document provider.
#[async_trait]
pub trait StyleCollaborator: Send + Sync {
    /// Archive references the style document declares, in document order.
    async fn archive_references(&self, request: &StyleRequest)
    -> anyhow::Result<Vec<ArchiveReference>>;

    /// Build the style's content and router once its archives are resolved.
    async fn build(
        &self,
        request: &StyleRequest,
        archives: &ResolvedArchives,
    ) -> anyhow::Result<StyleOutput>;
}

/// Rendered tile provider.
#[async_trait]
pub trait RenderedCollaborator: Send + Sync {
    /// Build the rendered tile set for a style.
    async fn build(
        &self,
        request: &StyleRequest,
        archives: &ResolvedArchives,
    ) -> anyhow::Result<RenderedOutput>;
}

/// Raw tile archive provider.
#[async_trait]
pub trait ArchiveCollaborator: Send + Sync {
    /// Open the archive and build its router.
    async fn build(&self, request: &ArchiveRequest) -> anyhow::Result<ArchiveOutput>;
}

/// Font catalog provider.
#[async_trait]
pub trait FontCollaborator: Send + Sync {
    /// Scan the catalog and build the shared font router.
    async fn build(&self, request: &FontRequest) -> anyhow::Result<FontOutput>;
}

/// The collaborators one generation is built with.
#[derive(Clone)]
pub struct Collaborators {
    /// Style documents.
    pub styles: Arc<dyn StyleCollaborator>,
    /// Rendered tiles; `None` when the running build cannot render.
    pub rendered: Option<Arc<dyn RenderedCollaborator>>,
    /// Raw archives.
    pub archives: Arc<dyn ArchiveCollaborator>,
    /// Fonts.
    pub fonts: Arc<dyn FontCollaborator>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("rendered", &self.rendered.is_some())
            .finish_non_exhaustive()
    }
}
