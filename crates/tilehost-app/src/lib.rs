#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::pedantic, clippy::nursery, unreachable_pub)]

//! Tile host application wiring.
//!
//! Layout: `cli.rs` (arguments), `bootstrap.rs` (process wiring),
//! `orchestrator.rs` (per-generation startup tasks), `reload.rs` (generation
//! lifecycle), `signals.rs` (process signals), `error.rs` (application errors).

pub mod bootstrap;
pub mod cli;
pub mod error;
pub mod orchestrator;
pub mod reload;
pub mod signals;

pub use bootstrap::run_app;
pub use cli::Cli;
pub use error::{AppError, AppResult};
pub use orchestrator::{Generation, boot};
pub use reload::{ControlSignal, ControllerStatus, ReloadController, ReloadState};
