//! Shared state handed to every handler of one generation.
//!
//! # Design
//! - Built fresh per generation; nothing here outlives a reload.
//! - Handlers read the registry and guard on presence of the requested id;
//!   global readiness only drives `/health`.

use std::sync::Arc;

use tilehost_config::ServerOptions;
use tilehost_core::{ReadinessHandle, ServingRegistry};
use tilehost_telemetry::Metrics;

use crate::http::mount::MountTable;
use crate::pages::PageTemplates;

/// Dependencies shared by the router and handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Serving registry of the generation.
    pub registry: Arc<ServingRegistry>,
    /// Aggregate readiness of the generation.
    pub readiness: ReadinessHandle,
    /// Collaborator routers mounted so far.
    pub mounts: MountTable,
    /// Global options (URL base, tile aliases, front page).
    pub options: Arc<ServerOptions>,
    /// Process metrics.
    pub metrics: Metrics,
    /// Page templating collaborator.
    pub pages: Arc<dyn PageTemplates>,
}

impl ApiState {
    /// Bundle the generation's dependencies.
    #[must_use]
    pub fn new(
        registry: Arc<ServingRegistry>,
        readiness: ReadinessHandle,
        mounts: MountTable,
        options: Arc<ServerOptions>,
        metrics: Metrics,
        pages: Arc<dyn PageTemplates>,
    ) -> Self {
        Self {
            registry,
            readiness,
            mounts,
            options,
            metrics,
            pages,
        }
    }
}
