//! Reload controller: runs generations back to back, one per reload signal.
//!
//! # Design
//! - Each generation starts from a fresh configuration snapshot and a fresh
//!   registry; nothing is carried over from the previous one.
//! - The listener binds as soon as a generation boots, so `/health` answers
//!   `Starting` while startup tasks are pending.
//! - A reload drains the running generation completely and releases the port
//!   before the next snapshot is loaded.
//! - A generation that fails to start is terminal: the controller moves to
//!   `Failed` and returns the error.
//! - Drain and startup are unbounded, but a terminate signal cuts either of
//!   them short.

use std::fmt::{self, Display, Formatter};
use std::net::SocketAddr;
use std::sync::Arc;

use tilehost_api::{ApiServer, ApiServerResult, ApiState, BasicPages, MountTable, PageTemplates};
use tilehost_config::{BindSettings, ConfigSource};
use tilehost_core::{Collaborators, CoreResult, ReadinessHandle, ServingRegistry};
use tilehost_telemetry::Metrics;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::orchestrator::boot;

/// Lifecycle state of the reload controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    /// Nothing has started yet.
    Idle,
    /// A generation is loading configuration and running startup tasks.
    Starting {
        /// Generation being started.
        generation: u64,
    },
    /// Every startup task of the generation resolved.
    Running {
        /// Generation accepting connections.
        generation: u64,
    },
    /// The listener stopped accepting; in-flight requests are finishing.
    Draining {
        /// Generation being drained.
        generation: u64,
    },
    /// The listener is released and the generation discarded.
    Stopped {
        /// Generation that stopped.
        generation: u64,
    },
    /// A generation failed to start. Terminal.
    Failed {
        /// Generation that failed.
        generation: u64,
    },
}

impl ReloadState {
    const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting { .. } => "starting",
            Self::Running { .. } => "running",
            Self::Draining { .. } => "draining",
            Self::Stopped { .. } => "stopped",
            Self::Failed { .. } => "failed",
        }
    }

    /// Generation the state refers to; zero while idle.
    #[must_use]
    pub const fn generation(self) -> u64 {
        match self {
            Self::Idle => 0,
            Self::Starting { generation }
            | Self::Running { generation }
            | Self::Draining { generation }
            | Self::Stopped { generation }
            | Self::Failed { generation } => generation,
        }
    }
}

impl Display for ReloadState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => formatter.write_str("idle"),
            _ => write!(formatter, "{}(gen={})", self.label(), self.generation()),
        }
    }
}

/// External control input for the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Drain the running generation and start the next one.
    Reload,
    /// Stop immediately without draining.
    Terminate,
}

/// Observable view of the controller, published on every transition.
#[derive(Debug, Clone)]
pub struct ControllerStatus {
    /// Current lifecycle state.
    pub state: ReloadState,
    /// Address the current generation is bound to, if any.
    pub addr: Option<SocketAddr>,
    /// Registry of the current generation, if any.
    pub registry: Option<Arc<ServingRegistry>>,
}

/// Drives generations from a configuration source.
pub struct ReloadController {
    source: Arc<dyn ConfigSource>,
    collaborators: Collaborators,
    metrics: Metrics,
    pages: Arc<dyn PageTemplates>,
    bind: BindSettings,
    generation: u64,
    status: watch::Sender<ControllerStatus>,
}

impl fmt::Debug for ReloadController {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadController")
            .field("bind", &self.bind)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// A generation with a bound listener.
struct LiveGeneration {
    generation: u64,
    addr: SocketAddr,
    registry: Arc<ServingRegistry>,
    readiness: ReadinessHandle,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<ApiServerResult<()>>,
    mounter: JoinHandle<()>,
}

impl LiveGeneration {
    /// Stop accepting, let in-flight requests finish, release the port.
    ///
    /// A terminate signal received meanwhile aborts the server and drops
    /// whatever is still in flight.
    async fn drain(self, signals: &mut mpsc::Receiver<ControlSignal>) -> AppResult<Drain> {
        let Self {
            generation,
            shutdown,
            mut server,
            mounter,
            ..
        } = self;
        if shutdown.send(()).is_err() {
            warn!(generation, "server stopped before drain was requested");
        }
        let served = tokio::select! {
            served = &mut server => Some(served),
            () = terminate_requested(signals, ReloadState::Draining { generation }) => None,
        };
        mounter.abort();
        let Some(served) = served else {
            warn!(generation, "terminated while draining; in-flight requests dropped");
            server.abort();
            return Ok(Drain::Aborted);
        };
        served
            .map_err(|source| AppError::Join {
                operation: "api_server.join",
                source,
            })?
            .map_err(|err| AppError::api_server("api_server.serve", err))?;
        Ok(Drain::Completed)
    }

    fn abort(self) {
        self.server.abort();
        self.mounter.abort();
    }
}

enum Settled {
    Ready(LiveGeneration),
    Terminated(LiveGeneration),
}

#[derive(Debug, PartialEq, Eq)]
enum Drain {
    Completed,
    Aborted,
}

/// Resolves on a terminate signal or a closed channel. Reloads arriving while
/// `state` is in progress are ignored.
async fn terminate_requested(signals: &mut mpsc::Receiver<ControlSignal>, state: ReloadState) {
    while let Some(signal) = signals.recv().await {
        match signal {
            ControlSignal::Reload => warn!(%state, "reload ignored until the transition completes"),
            ControlSignal::Terminate => return,
        }
    }
}

impl ReloadController {
    /// Build a controller serving the built-in pages.
    #[must_use]
    pub fn new(
        source: Arc<dyn ConfigSource>,
        collaborators: Collaborators,
        metrics: Metrics,
        bind: BindSettings,
    ) -> Self {
        let (status, _) = watch::channel(ControllerStatus {
            state: ReloadState::Idle,
            addr: None,
            registry: None,
        });
        Self {
            source,
            collaborators,
            metrics,
            pages: Arc::new(BasicPages),
            bind,
            generation: 0,
            status,
        }
    }

    /// Subscribe to state transitions.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<ControllerStatus> {
        self.status.subscribe()
    }

    /// Run generations until a terminate signal arrives or a generation fails.
    ///
    /// A closed signal channel counts as a terminate signal.
    ///
    /// # Errors
    ///
    /// Returns the error that moved the controller to `Failed`, or a drain
    /// failure of the running generation.
    pub async fn run(mut self, mut signals: mpsc::Receiver<ControlSignal>) -> AppResult<()> {
        loop {
            self.generation += 1;
            let generation = self.generation;
            self.transition(ReloadState::Starting { generation }, None, None);

            let started = tokio::select! {
                started = self.start(generation) => Some(started),
                () = terminate_requested(&mut signals, ReloadState::Starting { generation }) => None,
            };
            let live = match started {
                Some(Ok(live)) => live,
                Some(Err(err)) => {
                    self.transition(ReloadState::Failed { generation }, None, None);
                    return Err(err);
                }
                None => {
                    self.transition(ReloadState::Stopped { generation }, None, None);
                    return Ok(());
                }
            };
            let live = match Self::settle(live, &mut signals).await {
                Ok(Settled::Ready(live)) => live,
                Ok(Settled::Terminated(live)) => {
                    live.abort();
                    self.transition(ReloadState::Stopped { generation }, None, None);
                    return Ok(());
                }
                Err((live, source)) => {
                    live.abort();
                    self.transition(ReloadState::Failed { generation }, None, None);
                    return Err(AppError::Startup { generation, source });
                }
            };

            self.metrics.set_generation(generation);
            self.transition(
                ReloadState::Running { generation },
                Some(live.addr),
                Some(Arc::clone(&live.registry)),
            );

            match signals.recv().await {
                Some(ControlSignal::Reload) => {
                    self.metrics.inc_reload();
                    self.transition(ReloadState::Draining { generation }, Some(live.addr), None);
                    let drained = live.drain(&mut signals).await?;
                    self.transition(ReloadState::Stopped { generation }, None, None);
                    if drained == Drain::Aborted {
                        return Ok(());
                    }
                }
                Some(ControlSignal::Terminate) | None => {
                    live.abort();
                    self.transition(ReloadState::Stopped { generation }, None, None);
                    return Ok(());
                }
            }
        }
    }

    fn transition(
        &self,
        state: ReloadState,
        addr: Option<SocketAddr>,
        registry: Option<Arc<ServingRegistry>>,
    ) {
        let previous = self.status.borrow().state;
        info!(from = %previous, to = %state, "reload controller transition");
        self.status.send_replace(ControllerStatus {
            state,
            addr,
            registry,
        });
    }

    /// Load configuration, boot the generation and bind its listener.
    async fn start(&self, generation: u64) -> AppResult<LiveGeneration> {
        let config = self
            .source
            .load()
            .await
            .map_err(|err| AppError::config("config.load", err))?;
        let booted = boot(config, self.collaborators.clone(), self.metrics.clone());

        let mounts = MountTable::new();
        let state = ApiState::new(
            Arc::clone(&booted.registry),
            booted.readiness.clone(),
            mounts.clone(),
            Arc::clone(&booted.options),
            self.metrics.clone(),
            Arc::clone(&self.pages),
        );
        let mounter = tokio::spawn(mounts.run(booted.mounts));

        let listener = match ApiServer::bind(self.bind.socket_addr()).await {
            Ok(listener) => listener,
            Err(err) => {
                mounter.abort();
                return Err(AppError::api_server("api_server.bind", err));
            }
        };
        let addr = listener
            .local_addr()
            .unwrap_or_else(|_| self.bind.socket_addr());
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(ApiServer::new(state).serve(listener, async move {
            let _ = shutdown_rx.await;
        }));
        info!(generation, %addr, "listener bound");

        Ok(LiveGeneration {
            generation,
            addr,
            registry: booted.registry,
            readiness: booted.readiness,
            shutdown,
            server,
            mounter,
        })
    }

    /// Wait for readiness, honouring terminate signals meanwhile.
    async fn settle(
        live: LiveGeneration,
        signals: &mut mpsc::Receiver<ControlSignal>,
    ) -> Result<Settled, (LiveGeneration, tilehost_core::CoreError)> {
        let starting = ReloadState::Starting {
            generation: live.generation,
        };
        let settled: Option<CoreResult<()>> = tokio::select! {
            settled = live.readiness.wait() => Some(settled),
            () = terminate_requested(signals, starting) => None,
        };
        match settled {
            Some(Ok(())) => Ok(Settled::Ready(live)),
            Some(Err(err)) => Err((live, err)),
            None => Ok(Settled::Terminated(live)),
        }
    }
}
