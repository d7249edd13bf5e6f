#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::pedantic, clippy::nursery, unreachable_pub)]

//! HTTP surface of the tile host.
//!
//! Layout: `state.rs` (shared handler state), `models.rs` (listing payloads and
//! problem documents), `pages.rs` (templating seam), `http/` (router, route
//! mounter, health, listings, pages, middleware), `error.rs` (server errors).

pub mod error;
pub mod http;
pub mod models;
pub mod pages;
pub mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::mount::MountTable;
pub use http::router::ApiServer;
pub use pages::{ArchivePage, BasicPages, IndexPage, PageTemplates, StylePage, WmtsPage};
pub use state::ApiState;
