//! Health reporter and metrics endpoints.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::http::constants::{HEALTH_READY, HEALTH_STARTING, METRICS_CONTENT_TYPE};
use crate::http::errors::ApiError;
use crate::state::ApiState;

/// `200 OK` once every startup task of the generation resolved, `503 Starting` before.
pub(crate) async fn health(State(state): State<Arc<ApiState>>) -> Response {
    if state.readiness.is_ready() {
        (StatusCode::OK, HEALTH_READY).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, HEALTH_STARTING).into_response()
    }
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    match state.metrics.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)
            .body(Body::from(body))
            .map_err(|err| {
                error!(error = %err, "failed to build metrics response");
                ApiError::internal("failed to build metrics response")
            }),
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            Err(ApiError::internal("failed to render metrics"))
        }
    }
}
