//! Router construction and server host for one generation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{Method, Request},
    routing::get,
};
use tilehost_telemetry::build_sha;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Span, info};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::catalog::{fonts_json, index_json, mbtiles_json, rendered_json, styles_json};
use crate::http::constants::HEADER_REQUEST_ID;
use crate::http::health::{health, metrics};
use crate::http::mount::dispatch;
use crate::http::pages::{archive_page, front_page, style_page, wmts_capabilities};
use crate::http::telemetry::HttpMetricsLayer;
use crate::state::ApiState;

/// Axum router wrapper hosting one generation's HTTP surface.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the router around the generation's shared state.
    #[must_use]
    pub fn new(state: ApiState) -> Self {
        let state = Arc::new(state);
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let method = request.method().clone();
                let uri_path = request.uri().path();
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                tracing::info_span!(
                    "http.request",
                    method = %method,
                    route = %uri_path,
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    let status = response.status().as_u16();
                    span.record("status_code", status);
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(tilehost_telemetry::propagate_request_id_layer())
            .layer(tilehost_telemetry::set_request_id_layer())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(state.metrics.clone()));

        let router = Self::build_router()
            .layer(layered)
            .layer(cors_layer)
            .with_state(state);
        Self { router }
    }

    fn build_router() -> Router<Arc<ApiState>> {
        Self::public_routes()
            .merge(Self::listing_routes())
            .merge(Self::page_routes())
            .fallback(dispatch)
    }

    fn public_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
    }

    fn listing_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/styles.json", get(styles_json))
            .route("/rendered.json", get(rendered_json))
            .route("/mbtiles.json", get(mbtiles_json))
            .route("/data.json", get(mbtiles_json))
            .route("/index.json", get(index_json))
            .route("/fonts.json", get(fonts_json))
    }

    fn page_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/", get(front_page))
            .route("/styles/{id}/", get(style_page))
            .route("/styles/{id}/wmts.xml", get(wmts_capabilities))
            .route("/mbtiles/{id}/", get(archive_page))
            .route("/data/{id}/", get(archive_page))
    }

    /// The assembled router.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on an already bound listener until `shutdown` resolves, then drain
    /// in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Serve`] if the server terminates unexpectedly.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> ApiServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "serving http");
        }
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }

    /// Bind a listener on `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Bind`] if the address cannot be bound.
    pub async fn bind(addr: std::net::SocketAddr) -> ApiServerResult<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })
    }
}
