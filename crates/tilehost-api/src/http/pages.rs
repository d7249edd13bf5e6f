//! Templated pages. Each answers 404 unless its id is present in the registry
//! at request time.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::{Html, IntoResponse, Response},
};
use tilehost_config::FrontPage;
use tilehost_core::{KeyQuery, ResourceKind};
use tracing::error;

use crate::http::catalog::UrlContext;
use crate::http::constants::WMTS_CONTENT_TYPE;
use crate::http::errors::ApiError;
use crate::pages::{ArchivePage, IndexArchive, IndexPage, IndexStyle, StylePage, WmtsPage};
use crate::state::ApiState;

pub(crate) async fn front_page(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Result<Response, ApiError> {
    match &state.options.front_page {
        FrontPage::Disabled => Err(ApiError::not_found("the front page is disabled")),
        FrontPage::File(path) => match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Html(bytes).into_response()),
            Err(err) => {
                error!(path = %path.display(), error = %err, "failed to read front page");
                Err(ApiError::internal("failed to read the front page"))
            }
        },
        FrontPage::Builtin => {
            let urls = UrlContext::new(&state, &headers, &query);
            let page = IndexPage {
                styles: state
                    .registry
                    .styles
                    .list()
                    .into_iter()
                    .map(|(id, style)| IndexStyle {
                        style_url: urls.style_url(&id),
                        rendered: state.registry.rendered.contains(&id),
                        name: style.name,
                        id,
                    })
                    .collect(),
                archives: state
                    .registry
                    .served_archives()
                    .into_iter()
                    .filter_map(|(id, slot)| {
                        let info = slot.descriptor?;
                        Some(IndexArchive {
                            tilejson_url: urls.tilejson_url(&id),
                            name: info.name,
                            format: info.format,
                            id,
                        })
                    })
                    .collect(),
                key: urls.key,
            };
            Ok(Html(state.pages.index(&page)).into_response())
        }
    }
}

pub(crate) async fn style_page(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Result<Html<String>, ApiError> {
    let style = state
        .registry
        .styles
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("style `{id}` is not served")))?;
    let urls = UrlContext::new(&state, &headers, &query);
    let page = StylePage {
        style_url: urls.style_url(&id),
        name: style.name,
        id,
    };
    Ok(Html(state.pages.style(&page)))
}

pub(crate) async fn wmts_capabilities(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Result<Response, ApiError> {
    let rendered = state
        .registry
        .rendered
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("style `{id}` has no rendered tiles")))?;
    let urls = UrlContext::new(&state, &headers, &query);
    let namespace = ResourceKind::Rendered.namespace();
    let page = WmtsPage {
        tile_url: format!(
            "{}{namespace}/{id}/{{TileMatrix}}/{{TileCol}}/{{TileRow}}.{}{}",
            urls.base, rendered.info.format, urls.key
        ),
        capabilities_url: format!("{}{namespace}/{id}/wmts.xml{}", urls.base, urls.key),
        tile_size: rendered.tile_size,
        info: rendered.info,
        id,
    };
    let body = state.pages.wmts(&page);
    Ok(([(header::CONTENT_TYPE, WMTS_CONTENT_TYPE)], body).into_response())
}

pub(crate) async fn archive_page(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Result<Html<String>, ApiError> {
    let info = state
        .registry
        .served_archive(&id)
        .and_then(|slot| slot.descriptor)
        .ok_or_else(|| ApiError::not_found(format!("archive `{id}` is not served")))?;
    let urls = UrlContext::new(&state, &headers, &query);
    let page = ArchivePage {
        tilejson_url: urls.tilejson_url(&id),
        info,
        id,
    };
    Ok(Html(state.pages.archive(&page)))
}
