//! Listing endpoints over the serving registry.
//!
//! Every URL in a listing is expanded against the request (or `publicUrl`) and
//! carries the caller's `?key=` through.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use serde_json::Value;
use tilehost_core::{
    KeyQuery, ResourceKind, TileSetInfo, request_base_url, tile_extension, tile_url_template,
};
use tracing::warn;

use crate::http::constants::TILEJSON_VERSION;
use crate::models::{StyleListing, TileJson};
use crate::state::ApiState;

/// Per-request URL context.
pub(crate) struct UrlContext {
    pub(crate) base: String,
    pub(crate) key: String,
}

impl UrlContext {
    pub(crate) fn new(state: &ApiState, headers: &HeaderMap, query: &KeyQuery) -> Self {
        Self {
            base: request_base_url(headers, state.options.public_url.as_deref()),
            key: query.suffix(),
        }
    }

    pub(crate) fn style_url(&self, id: &str) -> String {
        format!(
            "{}{}/{id}/style.json{}",
            self.base,
            ResourceKind::Style.namespace(),
            self.key
        )
    }

    pub(crate) fn tilejson_url(&self, id: &str) -> String {
        format!(
            "{}{}/{id}.json{}",
            self.base,
            ResourceKind::Archive.namespace(),
            self.key
        )
    }
}

pub(crate) async fn styles_json(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Json<Vec<StyleListing>> {
    let urls = UrlContext::new(&state, &headers, &query);
    let listing = state
        .registry
        .styles
        .list()
        .into_iter()
        .map(|(id, style)| StyleListing {
            version: style.version,
            name: style.name,
            url: urls.style_url(&id),
            id,
        })
        .collect();
    Json(listing)
}

pub(crate) async fn rendered_json(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Json<Vec<Value>> {
    let urls = UrlContext::new(&state, &headers, &query);
    Json(rendered_entries(&state, &urls))
}

pub(crate) async fn mbtiles_json(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Json<Vec<Value>> {
    let urls = UrlContext::new(&state, &headers, &query);
    Json(archive_entries(&state, &urls))
}

/// Rendered tile sets followed by raw archives.
pub(crate) async fn index_json(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Json<Vec<Value>> {
    let urls = UrlContext::new(&state, &headers, &query);
    let mut entries = rendered_entries(&state, &urls);
    entries.extend(archive_entries(&state, &urls));
    Json(entries)
}

pub(crate) async fn fonts_json(State(state): State<Arc<ApiState>>) -> Json<Vec<String>> {
    Json(
        state
            .registry
            .fonts
            .list()
            .into_iter()
            .map(|(_, font)| font.name)
            .collect(),
    )
}

fn rendered_entries(state: &ApiState, urls: &UrlContext) -> Vec<Value> {
    state
        .registry
        .rendered
        .list()
        .iter()
        .filter_map(|(id, rendered)| {
            tilejson(state, urls, ResourceKind::Rendered, id, &rendered.info, rendered)
        })
        .collect()
}

fn archive_entries(state: &ApiState, urls: &UrlContext) -> Vec<Value> {
    state
        .registry
        .served_archives()
        .iter()
        .filter_map(|(id, slot)| {
            let info = slot.descriptor.as_ref()?;
            tilejson(state, urls, ResourceKind::Archive, id, info, info)
        })
        .collect()
}

fn tilejson<T: serde::Serialize>(
    state: &ApiState,
    urls: &UrlContext,
    kind: ResourceKind,
    id: &str,
    info: &TileSetInfo,
    payload: &T,
) -> Option<Value> {
    let ext = tile_extension(&info.format, &state.options.tile_alias);
    let document = TileJson {
        tilejson: TILEJSON_VERSION,
        id,
        tiles: vec![tile_url_template(
            &urls.base,
            kind.namespace(),
            id,
            ext,
            &urls.key,
        )],
        info: payload,
    };
    serde_json::to_value(&document)
        .inspect_err(|err| warn!(id, error = %err, "failed to encode tilejson"))
        .ok()
}
