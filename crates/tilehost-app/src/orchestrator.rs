//! Bootstrap orchestrator: builds one generation's resources from a configuration
//! snapshot.
//!
//! # Design
//! - Archive ids are settled before any collaborator work starts. Configured
//!   archives are seeded in configuration order, then every style's references
//!   are resolved one style at a time, so allocation never depends on task timing.
//! - All startup tasks are polled by one driver task through `FuturesUnordered`.
//!   Tasks interleave at their await points and never run in parallel with each
//!   other, and each writes only the registry ids it owns.
//! - Each completed task's router is sent on the mount stream immediately.
//!   Readiness settles once, after the last task or at the first rejection.
//! - On rejection the remaining tasks are dropped unfinished and their results
//!   never reach the registry.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tilehost_config::{ServerConfig, ServerOptions};
use tilehost_core::{
    ArchiveRequest, ArchiveResolver, ArchiveSlot, Collaborators, CoreError, CoreResult,
    FontDescriptor, FontRequest, Mount, ReadinessHandle, ResolvedArchives, ResourceKind,
    ServingRegistry, StyleRequest, readiness_channel,
};
use tilehost_telemetry::{Metrics, TaskOutcome};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

type StartupTask = BoxFuture<'static, CoreResult<Mount>>;

/// Everything one generation exposes to the HTTP surface.
#[derive(Debug)]
pub struct Generation {
    /// Fresh registry owned by this generation.
    pub registry: Arc<ServingRegistry>,
    /// Routers of completed startup tasks, in completion order.
    pub mounts: mpsc::UnboundedReceiver<Mount>,
    /// Aggregate readiness of every startup task.
    pub readiness: ReadinessHandle,
    /// Global options of the snapshot the generation was built from.
    pub options: Arc<ServerOptions>,
}

/// Start building a generation.
///
/// Returns immediately; the work runs on a spawned driver task. Must be called
/// from within a Tokio runtime.
#[must_use]
pub fn boot(config: ServerConfig, collaborators: Collaborators, metrics: Metrics) -> Generation {
    let registry = ServingRegistry::shared();
    let options = Arc::new(config.options.clone());
    let (publisher, readiness) = readiness_channel();
    let (mount_tx, mounts) = mpsc::unbounded_channel();

    let driver = Driver {
        resolver: ArchiveResolver::new(Arc::clone(&registry)),
        registry: Arc::clone(&registry),
        options: Arc::clone(&options),
        config,
        collaborators,
        metrics,
        mounts: mount_tx,
    };
    tokio::spawn(async move {
        match driver.run().await {
            Ok(tasks) => {
                info!(tasks, "all startup tasks resolved");
                publisher.mark_ready();
            }
            Err(err) => {
                let reason = failure_reason(&err);
                error!(error = %reason, "startup failed");
                publisher.mark_failed(reason);
            }
        }
    });

    Generation {
        registry,
        mounts,
        readiness,
        options,
    }
}

/// One line naming the failing task and its collaborator error chain.
fn failure_reason(err: &CoreError) -> String {
    match err {
        CoreError::Collaborator { label, source, .. } => format!("{label}: {source:#}"),
        CoreError::UnknownArchiveKey { key } => format!("{err}: {key}"),
        CoreError::ArchivePathWithoutStem { path } => format!("{err}: {}", path.display()),
        other => other.to_string(),
    }
}

struct PlannedStyle {
    request: StyleRequest,
    archives: ResolvedArchives,
}

struct Driver {
    config: ServerConfig,
    collaborators: Collaborators,
    metrics: Metrics,
    registry: Arc<ServingRegistry>,
    resolver: ArchiveResolver,
    options: Arc<ServerOptions>,
    mounts: mpsc::UnboundedSender<Mount>,
}

impl Driver {
    async fn run(self) -> CoreResult<usize> {
        self.seed_archives();
        let styles = self.plan_styles().await?;

        // Initiation order: styles, the font task, then raw archives.
        let mut tasks: FuturesUnordered<StartupTask> = FuturesUnordered::new();
        for planned in styles {
            if planned.request.entry.serve_archive {
                tasks.push(self.style_task(&planned));
            }
            if planned.request.entry.serve_rendered {
                tasks.push(self.rendered_task(&planned));
            }
        }
        tasks.push(self.font_task());
        for (id, slot) in self.registry.archives.list() {
            tasks.push(self.archive_task(id, slot.path));
        }

        let total = tasks.len();
        info!(tasks = total, "startup tasks started");
        while let Some(completed) = tasks.next().await {
            let mount = completed?;
            if self.mounts.send(mount).is_err() {
                debug!("mount stream closed; generation discarded");
            }
        }
        Ok(total)
    }

    fn seed_archives(&self) {
        for (id, entry) in &self.config.archives {
            if entry.is_blank() {
                warn!(id = %id, "archive entry has an empty path; skipping");
                self.metrics
                    .inc_startup_task(ResourceKind::Archive.as_str(), TaskOutcome::Skipped);
                continue;
            }
            self.registry
                .archives
                .set(id.clone(), ArchiveSlot::configured(entry.path.clone()));
        }
    }

    async fn plan_styles(&self) -> CoreResult<Vec<PlannedStyle>> {
        let mut planned = Vec::with_capacity(self.config.styles.len());
        for (id, entry) in &self.config.styles {
            let mut entry = entry.clone();
            if entry.serve_rendered && self.collaborators.rendered.is_none() {
                warn!(style = %id, "rendered tiles are not supported by this build; disabling");
                entry.serve_rendered = false;
            }
            if !entry.serve_archive && !entry.serve_rendered {
                debug!(style = %id, "style serves nothing; skipping");
                continue;
            }
            let request = StyleRequest {
                id: id.clone(),
                entry,
                options: Arc::clone(&self.options),
            };
            let archives = self.resolve_references(&request).await?;
            planned.push(PlannedStyle { request, archives });
        }
        Ok(planned)
    }

    async fn resolve_references(&self, request: &StyleRequest) -> CoreResult<ResolvedArchives> {
        let label = format!("style:{}", request.id);
        let references = self
            .collaborators
            .styles
            .archive_references(request)
            .await
            .map_err(|source| CoreError::Collaborator {
                kind: ResourceKind::Style,
                label,
                source,
            })?;

        let mut resolved = ResolvedArchives::default();
        for reference in references {
            let archive = self.resolver.resolve(&reference).inspect_err(|_| {
                self.metrics.inc_archive_resolution("rejected");
            })?;
            self.metrics.inc_archive_resolution(if archive.allocated {
                "allocated"
            } else {
                "existing"
            });
            debug!(style = %request.id, id = %archive.id, "archive reference resolved");
            resolved.push(reference, archive.id);
        }
        Ok(resolved)
    }

    fn track<F>(&self, kind: ResourceKind, label: String, work: F) -> StartupTask
    where
        F: Future<Output = anyhow::Result<Router>> + Send + 'static,
    {
        let metrics = self.metrics.clone();
        Box::pin(async move {
            debug!(task = %label, "startup task running");
            match work.await {
                Ok(router) => {
                    metrics.inc_startup_task(kind.as_str(), TaskOutcome::Succeeded);
                    info!(task = %label, "startup task resolved");
                    Ok(Mount::new(kind, label, router))
                }
                Err(source) => {
                    metrics.inc_startup_task(kind.as_str(), TaskOutcome::Failed);
                    Err(CoreError::Collaborator {
                        kind,
                        label,
                        source,
                    })
                }
            }
        })
    }

    fn archive_task(&self, id: String, path: PathBuf) -> StartupTask {
        let collaborator = Arc::clone(&self.collaborators.archives);
        let registry = Arc::clone(&self.registry);
        let label = format!("archive:{id}");
        let request = ArchiveRequest {
            id,
            path,
            options: Arc::clone(&self.options),
        };
        self.track(ResourceKind::Archive, label, async move {
            let output = collaborator.build(&request).await?;
            registry.archives.update(&request.id, |slot| {
                slot.descriptor = Some(output.descriptor);
            });
            Ok(output.router)
        })
    }

    fn style_task(&self, planned: &PlannedStyle) -> StartupTask {
        let collaborator = Arc::clone(&self.collaborators.styles);
        let registry = Arc::clone(&self.registry);
        let request = planned.request.clone();
        let archives = planned.archives.clone();
        let label = format!("style:{}", request.id);
        self.track(ResourceKind::Style, label, async move {
            let output = collaborator.build(&request, &archives).await?;
            registry.styles.set(request.id.clone(), output.descriptor);
            for font in output.fonts {
                registry
                    .fonts
                    .set_if_absent(font.clone(), FontDescriptor { name: font });
            }
            Ok(output.router)
        })
    }

    fn rendered_task(&self, planned: &PlannedStyle) -> StartupTask {
        let collaborator = self.collaborators.rendered.clone();
        let registry = Arc::clone(&self.registry);
        let request = planned.request.clone();
        let archives = planned.archives.clone();
        let label = format!("rendered:{}", request.id);
        self.track(ResourceKind::Rendered, label, async move {
            let Some(collaborator) = collaborator else {
                anyhow::bail!("rendered tiles are not supported by this build");
            };
            let output = collaborator.build(&request, &archives).await?;
            registry.rendered.set(request.id.clone(), output.descriptor);
            Ok(output.router)
        })
    }

    fn font_task(&self) -> StartupTask {
        let collaborator = Arc::clone(&self.collaborators.fonts);
        let registry = Arc::clone(&self.registry);
        let request = FontRequest {
            options: Arc::clone(&self.options),
            registry: Arc::clone(&self.registry),
        };
        self.track(ResourceKind::Font, "fonts".to_string(), async move {
            let output = collaborator.build(&request).await?;
            if request.options.serve_all_fonts {
                for font in output.catalog {
                    registry
                        .fonts
                        .set_if_absent(font.clone(), FontDescriptor { name: font });
                }
            }
            Ok(output.router)
        })
    }
}
