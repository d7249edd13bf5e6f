//! Style documents read from `paths.styles`.
//!
//! # Design
//! - Archive references are the `mbtiles://` source URLs of the document.
//! - Served documents point at local endpoints through a `local://` placeholder that is
//!   expanded per request, so the same generation answers behind any host or proxy.
//! - Sprites named by a relative path are served from `paths.sprites` below the style id.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::{Map, Value};
use tilehost_core::{
    ArchiveReference, KeyQuery, ResolvedArchives, ResourceKind, StyleCollaborator,
    StyleDescriptor, StyleOutput, StyleRequest, parse_archive_url, request_base_url,
};
use tracing::{debug, warn};

use crate::error::{FsError, FsResult};

const LOCAL_SCHEME: &str = "local://";
const DEFAULT_STYLE_VERSION: u32 = 8;

/// Style collaborator reading JSON documents from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStyles;

impl FsStyles {
    /// Build the collaborator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StyleCollaborator for FsStyles {
    async fn archive_references(
        &self,
        request: &StyleRequest,
    ) -> anyhow::Result<Vec<ArchiveReference>> {
        let document = read_style(&request.entry.document).await?;
        Ok(archive_references(
            &document,
            &request.options.paths.archives,
        ))
    }

    async fn build(
        &self,
        request: &StyleRequest,
        archives: &ResolvedArchives,
    ) -> anyhow::Result<StyleOutput> {
        let mut document = read_style(&request.entry.document).await?;
        let fonts = font_stacks(&document);
        rewrite_sources(&mut document, &request.options.paths.archives, archives);
        let sprite = rewrite_sprite(&mut document, &request.id, &request.options.paths.sprites);
        rewrite_glyphs(&mut document);

        let descriptor = StyleDescriptor {
            name: document
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(request.id.as_str())
                .to_string(),
            version: document
                .get("version")
                .and_then(Value::as_u64)
                .and_then(|version| u32::try_from(version).ok())
                .unwrap_or(DEFAULT_STYLE_VERSION),
            serve_rendered: request.entry.serve_rendered,
        };
        debug!(
            id = %request.id,
            fonts = fonts.len(),
            archives = archives.len(),
            "style document prepared"
        );

        let state = Arc::new(StyleState {
            document: Value::Object(document),
            sprite,
            public_url: request.options.public_url.clone(),
        });
        let namespace = ResourceKind::Style.namespace();
        let router = Router::new()
            .route(&format!("{namespace}/{}/style.json", request.id), get(style_json))
            .route(&format!("{namespace}/{}/{{file}}", request.id), get(sprite_file))
            .with_state(state);

        Ok(StyleOutput {
            descriptor,
            fonts,
            router,
        })
    }
}

#[derive(Debug)]
struct StyleState {
    document: Value,
    sprite: Option<PathBuf>,
    public_url: Option<String>,
}

async fn style_json(
    State(state): State<Arc<StyleState>>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Response {
    let base = request_base_url(&headers, state.public_url.as_deref());
    let mut document = state.document.clone();
    expand_local_urls(&mut document, &base, &query.suffix());
    axum::Json(document).into_response()
}

async fn sprite_file(
    State(state): State<Arc<StyleState>>,
    UrlPath(file): UrlPath<String>,
) -> Response {
    let Some(base) = state.sprite.as_deref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some((scale, ext)) = parse_sprite_file(&file) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let mut name = base.as_os_str().to_owned();
    name.push(format!("{scale}.{ext}"));
    let path = PathBuf::from(name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = if ext == "json" {
                "application/json"
            } else {
                "image/png"
            };
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(err) => {
            debug!(path = %path.display(), error = %err, "sprite file unavailable");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Parse `sprite{@Nx}.{json|png}` into its scale and extension.
fn parse_sprite_file(file: &str) -> Option<(&str, &str)> {
    let rest = file.strip_prefix("sprite")?;
    let (scale, ext) = rest.rsplit_once('.')?;
    let scale_ok = scale.is_empty()
        || scale
            .strip_prefix('@')
            .and_then(|value| value.strip_suffix('x'))
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));
    (scale_ok && matches!(ext, "json" | "png")).then_some((scale, ext))
}

async fn read_style(path: &Path) -> FsResult<Map<String, Value>> {
    let bytes = tokio::fs::read(path).await.map_err(|source| FsError::Io {
        operation: "style.read",
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(FsError::InvalidStyle {
            path: path.to_path_buf(),
            reason: "empty_document",
        });
    }
    let value: Value = serde_json::from_slice(&bytes).map_err(|source| FsError::Json {
        operation: "style.parse",
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(FsError::InvalidStyle {
            path: path.to_path_buf(),
            reason: "not_an_object",
        }),
    }
}

fn source_urls(document: &Map<String, Value>) -> impl Iterator<Item = &str> {
    document
        .get("sources")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(Map::values)
        .filter_map(|source| source.get("url").and_then(Value::as_str))
}

fn archive_references(document: &Map<String, Value>, archives_root: &Path) -> Vec<ArchiveReference> {
    let mut references = Vec::new();
    for url in source_urls(document) {
        if let Some(reference) = parse_archive_url(url, archives_root)
            && !references.contains(&reference)
        {
            references.push(reference);
        }
    }
    references
}

fn rewrite_sources(
    document: &mut Map<String, Value>,
    archives_root: &Path,
    archives: &ResolvedArchives,
) {
    let Some(sources) = document.get_mut("sources").and_then(Value::as_object_mut) else {
        return;
    };
    for (name, source) in sources.iter_mut() {
        let Some(url) = source.get("url").and_then(Value::as_str) else {
            continue;
        };
        let Some(reference) = parse_archive_url(url, archives_root) else {
            continue;
        };
        match archives.get(&reference) {
            Some(id) => {
                source["url"] = Value::String(format!(
                    "{LOCAL_SCHEME}{}/{id}.json",
                    ResourceKind::Archive.namespace().trim_start_matches('/')
                ));
            }
            None => warn!(source = %name, url, "style source references an unresolved archive"),
        }
    }
}

fn rewrite_glyphs(document: &mut Map<String, Value>) {
    let remote = document
        .get("glyphs")
        .and_then(Value::as_str)
        .is_some_and(is_remote);
    if !remote {
        document.insert(
            "glyphs".into(),
            Value::String(format!("{LOCAL_SCHEME}fonts/{{fontstack}}/{{range}}.pbf")),
        );
    }
}

fn rewrite_sprite(document: &mut Map<String, Value>, id: &str, sprites_root: &Path) -> Option<PathBuf> {
    let sprite = document.get("sprite").and_then(Value::as_str)?;
    if is_remote(sprite) {
        return None;
    }
    let relative = sprite.strip_prefix("{styleJsonFolder}/").unwrap_or(sprite);
    let path = sprites_root.join(relative);
    document.insert(
        "sprite".into(),
        Value::String(format!("{LOCAL_SCHEME}styles/{id}/sprite")),
    );
    Some(path)
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Every font named by a literal `text-font` array, in first-use order.
fn font_stacks(document: &Map<String, Value>) -> Vec<String> {
    let mut fonts: Vec<String> = Vec::new();
    let layers = document.get("layers").and_then(Value::as_array);
    for layer in layers.into_iter().flatten() {
        let stack = layer
            .get("layout")
            .and_then(|layout| layout.get("text-font"))
            .and_then(Value::as_array);
        for font in stack.into_iter().flatten().filter_map(Value::as_str) {
            if !fonts.iter().any(|known| known == font) {
                fonts.push(font.to_string());
            }
        }
    }
    fonts
}

fn expand_local_urls(document: &mut Value, base: &str, key: &str) {
    let expand = |value: &mut Value, with_key: bool| {
        if let Some(url) = value.as_str().and_then(|url| url.strip_prefix(LOCAL_SCHEME)) {
            let suffix = if with_key { key } else { "" };
            *value = Value::String(format!("{base}/{url}{suffix}"));
        }
    };
    if let Some(sources) = document.get_mut("sources").and_then(Value::as_object_mut) {
        for source in sources.values_mut() {
            if let Some(url) = source.get_mut("url") {
                expand(url, true);
            }
        }
    }
    if let Some(glyphs) = document.get_mut("glyphs") {
        expand(glyphs, true);
    }
    // Clients append `@2x.png` to the sprite base, so no query can follow it.
    if let Some(sprite) = document.get_mut("sprite") {
        expand(sprite, false);
    }
}
