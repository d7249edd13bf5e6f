//! Shared HTTP constants (headers, problem URIs, payload versions).

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

pub(crate) const PROBLEM_INTERNAL: &str = "https://tilehost.dev/problems/internal";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://tilehost.dev/problems/not-found";

pub(crate) const TILEJSON_VERSION: &str = "2.0.0";
pub(crate) const HEALTH_READY: &str = "OK";
pub(crate) const HEALTH_STARTING: &str = "Starting";
pub(crate) const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";
pub(crate) const WMTS_CONTENT_TYPE: &str = "application/xml";
