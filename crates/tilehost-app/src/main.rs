#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Binary entrypoint for the tile host.

use clap::Parser;
use tilehost_app::{AppResult, Cli, run_app};

/// Parse arguments and serve until terminated or a generation fails.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app(Cli::parse()).await
}
