//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters the host needs to explain a boot or a reload after the fact.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Final state of one startup task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The collaborator produced a mountable handler.
    Succeeded,
    /// The collaborator rejected.
    Failed,
    /// The entry was skipped without failing the generation.
    Skipped,
}

impl TaskOutcome {
    const fn as_label(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    startup_tasks_total: IntCounterVec,
    archive_resolutions_total: IntCounterVec,
    generation: IntGauge,
    reloads_total: IntCounter,
}

/// Snapshot of selected gauges and counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Generation currently bound, zero before the first bind.
    pub generation: i64,
    /// Reload signals acted upon.
    pub reloads_total: u64,
    /// Startup tasks that produced a handler.
    pub startup_tasks_succeeded: u64,
    /// Startup tasks that rejected.
    pub startup_tasks_failed: u64,
    /// Archive entries skipped as soft configuration errors.
    pub startup_tasks_skipped: u64,
}

fn collector<T>(name: &'static str, built: prometheus::Result<T>) -> Result<T> {
    built.map_err(|source| TelemetryError::MetricsCollector { name, source })
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = collector(
            "http_requests_total",
            IntCounterVec::new(
                Opts::new("http_requests_total", "Total HTTP requests received"),
                &["route", "code"],
            ),
        )?;
        let startup_tasks_total = collector(
            "startup_tasks_total",
            IntCounterVec::new(
                Opts::new("startup_tasks_total", "Startup tasks finished by kind and outcome"),
                &["kind", "outcome"],
            ),
        )?;
        let archive_resolutions_total = collector(
            "archive_resolutions_total",
            IntCounterVec::new(
                Opts::new(
                    "archive_resolutions_total",
                    "Archive references resolved to an existing or newly allocated id",
                ),
                &["outcome"],
            ),
        )?;
        let generation = collector(
            "generation",
            IntGauge::with_opts(Opts::new("generation", "Generation currently accepting connections")),
        )?;
        let reloads_total = collector(
            "reloads_total",
            IntCounter::with_opts(Opts::new("reloads_total", "Reload signals acted upon")),
        )?;

        let register = |name: &'static str, metric: Box<dyn prometheus::core::Collector>| {
            registry
                .register(metric)
                .map_err(|source| TelemetryError::MetricsRegister { name, source })
        };
        register("http_requests_total", Box::new(http_requests_total.clone()))?;
        register("startup_tasks_total", Box::new(startup_tasks_total.clone()))?;
        register(
            "archive_resolutions_total",
            Box::new(archive_resolutions_total.clone()),
        )?;
        register("generation", Box::new(generation.clone()))?;
        register("reloads_total", Box::new(reloads_total.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                startup_tasks_total,
                archive_resolutions_total,
                generation,
                reloads_total,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Record the outcome of one startup task.
    pub fn inc_startup_task(&self, kind: &str, outcome: TaskOutcome) {
        self.inner
            .startup_tasks_total
            .with_label_values(&[kind, outcome.as_label()])
            .inc();
    }

    /// Record how an archive reference was resolved (`existing` or `allocated`).
    pub fn inc_archive_resolution(&self, outcome: &str) {
        self.inner
            .archive_resolutions_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Publish the generation now accepting connections.
    pub fn set_generation(&self, generation: u64) {
        self.inner
            .generation
            .set(i64::try_from(generation).unwrap_or(i64::MAX));
    }

    /// Increment the reload counter.
    pub fn inc_reload(&self) {
        self.inner.reloads_total.inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let tasks = |outcome: TaskOutcome| -> u64 {
            ["style", "rendered", "archive", "font"]
                .iter()
                .map(|kind| {
                    self.inner
                        .startup_tasks_total
                        .with_label_values(&[*kind, outcome.as_label()])
                        .get()
                })
                .sum()
        };
        MetricsSnapshot {
            generation: self.inner.generation.get(),
            reloads_total: self.inner.reloads_total.get(),
            startup_tasks_succeeded: tasks(TaskOutcome::Succeeded),
            startup_tasks_failed: tasks(TaskOutcome::Failed),
            startup_tasks_skipped: tasks(TaskOutcome::Skipped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/health", 503);
        metrics.inc_startup_task("style", TaskOutcome::Succeeded);
        metrics.inc_startup_task("archive", TaskOutcome::Succeeded);
        metrics.inc_startup_task("archive", TaskOutcome::Skipped);
        metrics.inc_startup_task("font", TaskOutcome::Failed);
        metrics.inc_archive_resolution("allocated");
        metrics.set_generation(3);
        metrics.inc_reload();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.generation, 3);
        assert_eq!(snapshot.reloads_total, 1);
        assert_eq!(snapshot.startup_tasks_succeeded, 2);
        assert_eq!(snapshot.startup_tasks_failed, 1);
        assert_eq!(snapshot.startup_tasks_skipped, 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("startup_tasks_total"));
        assert!(rendered.contains("archive_resolutions_total"));
        Ok(())
    }
}
