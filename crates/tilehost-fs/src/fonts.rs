//! Glyph ranges served from the font catalog under `paths.fonts`.
//!
//! Each catalog entry is a directory named after the font holding `{start}-{end}.pbf`
//! range files. A request names a comma separated stack; the first font of the
//! stack that is allowed and holds the range answers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Path as UrlPath, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tilehost_core::{FontCollaborator, FontOutput, FontRequest, ResourceKind, ServingRegistry};
use tracing::{debug, info};

use crate::error::{FsError, FsResult};

const GLYPH_EXTENSION: &str = "pbf";
const GLYPH_CONTENT_TYPE: &str = "application/x-protobuf";

/// Font collaborator backed by a directory of glyph range files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFonts;

impl FsFonts {
    /// Build the collaborator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FontCollaborator for FsFonts {
    async fn build(&self, request: &FontRequest) -> anyhow::Result<FontOutput> {
        let root = request.options.paths.fonts.clone();
        let catalog = scan_catalog(&root).await?;
        info!(root = %root.display(), fonts = catalog.len(), "font catalog scanned");

        let state = Arc::new(FontState {
            root,
            catalog: catalog.clone(),
            serve_all: request.options.serve_all_fonts,
            registry: Arc::clone(&request.registry),
        });
        let router = Router::new()
            .route(
                &format!("{}/{{fontstack}}/{{range}}", ResourceKind::Font.namespace()),
                get(glyph_range),
            )
            .with_state(state);
        Ok(FontOutput { catalog, router })
    }
}

#[derive(Debug)]
struct FontState {
    root: PathBuf,
    catalog: Vec<String>,
    serve_all: bool,
    registry: Arc<ServingRegistry>,
}

impl FontState {
    fn allows(&self, font: &str) -> bool {
        self.catalog.iter().any(|known| known == font)
            && (self.serve_all || self.registry.fonts.contains(font))
    }
}

async fn glyph_range(
    State(state): State<Arc<FontState>>,
    UrlPath((fontstack, range)): UrlPath<(String, String)>,
) -> Response {
    if !is_glyph_range(&range) {
        return StatusCode::NOT_FOUND.into_response();
    }
    for font in fontstack.split(',').map(str::trim).filter(|font| !font.is_empty()) {
        if !state.allows(font) {
            debug!(font, "font not served by this generation");
            continue;
        }
        let path = state.root.join(font).join(&range);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                return ([(header::CONTENT_TYPE, GLYPH_CONTENT_TYPE)], bytes).into_response();
            }
            Err(err) => debug!(path = %path.display(), error = %err, "glyph range missing"),
        }
    }
    StatusCode::NOT_FOUND.into_response()
}

/// `{start}-{end}.pbf` with decimal bounds.
fn is_glyph_range(range: &str) -> bool {
    let Some(stem) = range
        .strip_suffix(GLYPH_EXTENSION)
        .and_then(|rest| rest.strip_suffix('.'))
    else {
        return false;
    };
    let digits = |value: &str| !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit());
    stem.split_once('-')
        .is_some_and(|(start, end)| digits(start) && digits(end))
}

/// Directories under `root` holding at least one glyph range, sorted by name.
async fn scan_catalog(root: &Path) -> FsResult<Vec<String>> {
    let io_err = |operation: &'static str, path: &Path| {
        let path = path.to_path_buf();
        move |source| FsError::Io {
            operation,
            path,
            source,
        }
    };
    let mut entries = tokio::fs::read_dir(root)
        .await
        .map_err(io_err("fonts.read_dir", root))?;
    let mut catalog = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(io_err("fonts.next_entry", root))?
    {
        let path = entry.path();
        let is_dir = entry
            .file_type()
            .await
            .map_err(io_err("fonts.file_type", &path))?
            .is_dir();
        if !is_dir || !holds_glyphs(&path).await? {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            catalog.push(name.to_string());
        }
    }
    catalog.sort();
    Ok(catalog)
}

async fn holds_glyphs(dir: &Path) -> FsResult<bool> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|source| FsError::Io {
        operation: "fonts.read_font_dir",
        path: dir.to_path_buf(),
        source,
    })?;
    while let Some(entry) = entries.next_entry().await.map_err(|source| FsError::Io {
        operation: "fonts.next_font_entry",
        path: dir.to_path_buf(),
        source,
    })? {
        let name = entry.file_name();
        if name.to_str().is_some_and(is_glyph_range) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tilehost_config::{FrontPage, ResolvedPaths, ServerOptions, TileAlias};
    use tilehost_core::FontDescriptor;
    use tower::ServiceExt;

    fn options(fonts: &Path, serve_all: bool) -> Arc<ServerOptions> {
        Arc::new(ServerOptions {
            paths: ResolvedPaths {
                root: fonts.to_path_buf(),
                styles: fonts.to_path_buf(),
                fonts: fonts.to_path_buf(),
                sprites: fonts.to_path_buf(),
                archives: fonts.to_path_buf(),
            },
            tile_alias: TileAlias::default(),
            front_page: FrontPage::Builtin,
            archive_post_process_hook: None,
            public_url: None,
            serve_all_fonts: serve_all,
        })
    }

    fn write_font(root: &Path, name: &str, ranges: &[(&str, &[u8])]) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).expect("font dir");
        for (range, bytes) in ranges {
            std::fs::write(dir.join(range), bytes).expect("glyph file");
        }
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, body.to_vec())
    }

    #[test]
    fn glyph_ranges_are_validated() {
        assert!(is_glyph_range("0-255.pbf"));
        assert!(is_glyph_range("65280-65535.pbf"));
        assert!(!is_glyph_range("0-255.png"));
        assert!(!is_glyph_range("../secret.pbf"));
        assert!(!is_glyph_range("-255.pbf"));
    }

    #[tokio::test]
    async fn catalog_lists_font_directories_with_glyphs() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_font(dir.path(), "Open Sans Bold", &[("0-255.pbf", b"open")]);
        write_font(dir.path(), "Noto Sans Regular", &[("0-255.pbf", b"noto")]);
        write_font(dir.path(), "empty", &[("README", b"none")]);
        std::fs::write(dir.path().join("stray.pbf"), b"file").expect("stray");

        let catalog = scan_catalog(dir.path()).await.expect("catalog");
        assert_eq!(catalog, ["Noto Sans Regular", "Open Sans Bold"]);
    }

    #[tokio::test]
    async fn first_allowed_font_in_stack_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_font(dir.path(), "Noto Sans Regular", &[("0-255.pbf", b"noto")]);
        write_font(
            dir.path(),
            "Open Sans Bold",
            &[("0-255.pbf", b"open"), ("256-511.pbf", b"open-ext")],
        );
        let registry = ServingRegistry::shared();
        registry.fonts.set(
            "Open Sans Bold",
            FontDescriptor {
                name: "Open Sans Bold".into(),
            },
        );
        let output = FsFonts::new()
            .build(&FontRequest {
                options: options(dir.path(), false),
                registry: Arc::clone(&registry),
            })
            .await
            .expect("fonts build");

        // Noto is catalogued but no style uses it, so Open Sans answers.
        let (status, body) = get(
            output.router.clone(),
            "/fonts/Noto%20Sans%20Regular,Open%20Sans%20Bold/0-255.pbf",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"open");

        let (status, _) = get(output.router, "/fonts/Noto%20Sans%20Regular/0-255.pbf").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serve_all_fonts_ignores_the_registry() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_font(dir.path(), "Noto Sans Regular", &[("0-255.pbf", b"noto")]);
        let output = FsFonts::new()
            .build(&FontRequest {
                options: options(dir.path(), true),
                registry: ServingRegistry::shared(),
            })
            .await
            .expect("fonts build");
        let (status, body) = get(output.router, "/fonts/Noto%20Sans%20Regular/0-255.pbf").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"noto");
    }
}
