//! HTTP surface modules (router, route mounter, handlers, middleware).

/// Listing endpoints (`/styles.json`, `/rendered.json`, ...).
pub mod catalog;
/// Shared constants and header names.
pub mod constants;
/// Problem response helpers.
pub mod errors;
/// Health and metrics endpoints.
pub mod health;
/// Route mounter for collaborator routers.
pub mod mount;
/// Templated page handlers.
pub mod pages;
/// Router construction and server host.
pub mod router;
/// Metrics middleware for HTTP requests.
pub mod telemetry;
