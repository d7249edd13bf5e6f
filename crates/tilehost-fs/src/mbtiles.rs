//! Raw tile archives stored as MBTiles (SQLite) files.
//!
//! # Design
//! - Each archive gets its own read-only pool, owned by its router; dropping the
//!   generation's routers closes the files.
//! - Tiles are addressed in XYZ order on the wire and TMS order in the file.
//! - Missing metadata falls back to values derived from the `tiles` table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::{Value, json};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tilehost_config::TileAlias;
use tilehost_core::{
    ArchiveCollaborator, ArchiveDescriptor, ArchiveOutput, ArchiveRequest, KeyQuery,
    ResourceKind, TileSetInfo, key_suffix, request_base_url, tile_extension, tile_url_template,
};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{FsError, FsResult};

const MAX_CONNECTIONS: u32 = 4;
const MAX_ZOOM: u8 = 30;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const TILEJSON_VERSION: &str = "2.0.0";

const SELECT_METADATA: &str = "SELECT name, value FROM metadata";
const SELECT_ZOOM_RANGE: &str = "SELECT MIN(zoom_level) AS minzoom, MAX(zoom_level) AS maxzoom FROM tiles";
const SELECT_TILE: &str = r"
    SELECT tile_data FROM tiles
    WHERE zoom_level = ? AND tile_column = ? AND tile_row = ?
";

/// Environment variables handed to the post-process hook.
pub const HOOK_ENV_Z: &str = "TILEHOST_TILE_Z";
/// Column of the tile being post-processed.
pub const HOOK_ENV_X: &str = "TILEHOST_TILE_X";
/// Row (XYZ order) of the tile being post-processed.
pub const HOOK_ENV_Y: &str = "TILEHOST_TILE_Y";
/// Tile format of the archive.
pub const HOOK_ENV_FORMAT: &str = "TILEHOST_TILE_FORMAT";

/// Archive collaborator opening MBTiles files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArchives;

impl FsArchives {
    /// Build the collaborator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArchiveCollaborator for FsArchives {
    async fn build(&self, request: &ArchiveRequest) -> anyhow::Result<ArchiveOutput> {
        let pool = open_archive(&request.path).await?;
        let metadata = read_metadata(&pool, &request.path).await?;
        let descriptor = describe(&request.id, &metadata, &pool, &request.path).await?;
        let vector_layers = metadata
            .get("json")
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
            .and_then(|value| value.get("vector_layers").cloned());
        info!(
            id = %request.id,
            path = %request.path.display(),
            format = %descriptor.format,
            minzoom = descriptor.minzoom,
            maxzoom = descriptor.maxzoom,
            "archive opened"
        );

        let state = Arc::new(ArchiveState {
            id: request.id.clone(),
            path: request.path.clone(),
            info: descriptor.clone(),
            vector_layers,
            public_url: request.options.public_url.clone(),
            tile_alias: request.options.tile_alias.clone(),
            hook: request.options.archive_post_process_hook.clone(),
            pool,
        });
        let namespace = ResourceKind::Archive.namespace();
        let router = Router::new()
            .route(&format!("{namespace}/{}.json", request.id), get(tilejson))
            .route(
                &format!("{namespace}/{}/{{z}}/{{x}}/{{tile}}", request.id),
                get(tile),
            )
            .with_state(state);
        Ok(ArchiveOutput { descriptor, router })
    }
}

#[derive(Debug)]
struct ArchiveState {
    id: String,
    path: PathBuf,
    info: ArchiveDescriptor,
    vector_layers: Option<Value>,
    public_url: Option<String>,
    tile_alias: TileAlias,
    hook: Option<PathBuf>,
    pool: SqlitePool,
}

async fn open_archive(path: &Path) -> FsResult<SqlitePool> {
    tokio::fs::metadata(path)
        .await
        .map_err(|source| FsError::Io {
            operation: "archive.metadata",
            path: path.to_path_buf(),
            source,
        })?;
    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .create_if_missing(false);
    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .map_err(map_sqlx_err("archive.open", path))
}

async fn read_metadata(pool: &SqlitePool, path: &Path) -> FsResult<HashMap<String, String>> {
    let rows = sqlx::query(SELECT_METADATA)
        .fetch_all(pool)
        .await
        .map_err(map_sqlx_err("archive.read_metadata", path))?;
    let mut metadata = HashMap::with_capacity(rows.len());
    for row in rows {
        let name: String = row
            .try_get("name")
            .map_err(map_sqlx_err("archive.decode_metadata", path))?;
        let value: Option<String> = row
            .try_get("value")
            .map_err(map_sqlx_err("archive.decode_metadata", path))?;
        if let Some(value) = value {
            metadata.insert(name, value);
        }
    }
    Ok(metadata)
}

async fn describe(
    id: &str,
    metadata: &HashMap<String, String>,
    pool: &SqlitePool,
    path: &Path,
) -> FsResult<ArchiveDescriptor> {
    let mut info = TileSetInfo::named(
        metadata.get("name").map_or(id, String::as_str),
        metadata.get("format").map_or("png", String::as_str),
    );
    info.attribution = metadata.get("attribution").cloned();
    info.bounds = metadata.get("bounds").and_then(|raw| parse_floats::<4>(raw));

    let declared = (
        metadata.get("minzoom").and_then(|raw| raw.trim().parse::<u8>().ok()),
        metadata.get("maxzoom").and_then(|raw| raw.trim().parse::<u8>().ok()),
    );
    let (minzoom, maxzoom) = match declared {
        (Some(min), Some(max)) => (min, max),
        (min, max) => {
            let row = sqlx::query(SELECT_ZOOM_RANGE)
                .fetch_one(pool)
                .await
                .map_err(map_sqlx_err("archive.zoom_range", path))?;
            let stored_min: Option<i64> = row
                .try_get("minzoom")
                .map_err(map_sqlx_err("archive.decode_zoom_range", path))?;
            let stored_max: Option<i64> = row
                .try_get("maxzoom")
                .map_err(map_sqlx_err("archive.decode_zoom_range", path))?;
            (
                min.or_else(|| stored_min.and_then(|z| u8::try_from(z).ok()))
                    .unwrap_or(info.minzoom),
                max.or_else(|| stored_max.and_then(|z| u8::try_from(z).ok()))
                    .unwrap_or(info.maxzoom),
            )
        }
    };
    info.minzoom = minzoom;
    info.maxzoom = maxzoom;

    info.center = metadata
        .get("center")
        .and_then(|raw| parse_floats::<3>(raw))
        .or_else(|| {
            info.bounds.map(|[west, south, east, north]| {
                [
                    (west + east) / 2.0,
                    (south + north) / 2.0,
                    f64::from(minzoom.midpoint(maxzoom)),
                ]
            })
        });
    Ok(info)
}

fn parse_floats<const N: usize>(raw: &str) -> Option<[f64; N]> {
    let mut values = [0.0; N];
    let mut parts = raw.split(',');
    for slot in &mut values {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    parts.next().is_none().then_some(values)
}

fn map_sqlx_err(operation: &'static str, path: &Path) -> impl FnOnce(sqlx::Error) -> FsError {
    let path = path.to_path_buf();
    move |source| FsError::Database {
        operation,
        path,
        source,
    }
}

async fn tilejson(
    State(state): State<Arc<ArchiveState>>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Response {
    let base = request_base_url(&headers, state.public_url.as_deref());
    let ext = tile_extension(&state.info.format, &state.tile_alias);
    let template = tile_url_template(
        &base,
        ResourceKind::Archive.namespace(),
        &state.id,
        ext,
        &key_suffix(query.key.as_deref()),
    );
    let mut document = json!({
        "tilejson": TILEJSON_VERSION,
        "tiles": [template],
    });
    if let (Value::Object(target), Ok(Value::Object(info))) =
        (&mut document, serde_json::to_value(&state.info))
    {
        target.extend(info);
        if let Some(layers) = &state.vector_layers {
            target.insert("vector_layers".into(), layers.clone());
        }
    }
    axum::Json(document).into_response()
}

async fn tile(
    State(state): State<Arc<ArchiveState>>,
    UrlPath((z, x, file)): UrlPath<(u8, u32, String)>,
) -> Response {
    let Some((y, ext)) = file.rsplit_once('.') else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Ok(y) = y.parse::<u32>() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let format = state.info.format.as_str();
    if ext != format && ext != tile_extension(format, &state.tile_alias) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let Some(row) = tms_row(z, x, y) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let data = match fetch_tile(&state.pool, z, x, row).await {
        Ok(Some(data)) => data,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(source) => {
            warn!(
                id = %state.id,
                path = %state.path.display(),
                z, x, y,
                error = %source,
                "tile read failed"
            );
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let data = match &state.hook {
        Some(hook) => match run_hook(hook, data, z, x, y, format).await {
            Ok(processed) => processed,
            Err(err) => {
                warn!(id = %state.id, hook = %hook.display(), error = %err, "post-process hook failed");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        },
        None => data,
    };
    tile_response(format, data)
}

/// Flip an XYZ row into the TMS row MBTiles stores; `None` when out of range.
fn tms_row(z: u8, x: u32, y: u32) -> Option<u32> {
    if z > MAX_ZOOM {
        return None;
    }
    let extent = 1_u64 << z;
    if u64::from(x) >= extent || u64::from(y) >= extent {
        return None;
    }
    u32::try_from(extent - 1 - u64::from(y)).ok()
}

async fn fetch_tile(pool: &SqlitePool, z: u8, x: u32, row: u32) -> sqlx::Result<Option<Vec<u8>>> {
    let found = sqlx::query(SELECT_TILE)
        .bind(i64::from(z))
        .bind(i64::from(x))
        .bind(i64::from(row))
        .fetch_optional(pool)
        .await?;
    found.map(|row| row.try_get("tile_data")).transpose()
}

async fn run_hook(
    hook: &Path,
    data: Vec<u8>,
    z: u8,
    x: u32,
    y: u32,
    format: &str,
) -> FsResult<Vec<u8>> {
    let spawn_err = |source| FsError::HookSpawn {
        path: hook.to_path_buf(),
        source,
    };
    let mut child = Command::new(hook)
        .env(HOOK_ENV_Z, z.to_string())
        .env(HOOK_ENV_X, x.to_string())
        .env(HOOK_ENV_Y, y.to_string())
        .env(HOOK_ENV_FORMAT, format)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(spawn_err)?;
    let stdin = child.stdin.take();
    let feed = async move {
        if let Some(mut stdin) = stdin {
            stdin.write_all(&data).await?;
        }
        Ok::<(), std::io::Error>(())
    };
    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output.map_err(spawn_err)?;
    match fed {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {
            debug!(hook = %hook.display(), "hook closed stdin before reading the whole tile");
        }
        Err(err) => return Err(spawn_err(err)),
    }
    if !output.status.success() {
        return Err(FsError::HookStatus {
            path: hook.to_path_buf(),
            code: output.status.code(),
        });
    }
    debug!(hook = %hook.display(), z, x, y, bytes = output.stdout.len(), "tile post-processed");
    Ok(output.stdout)
}

fn tile_response(format: &str, data: Vec<u8>) -> Response {
    let content_type = match format {
        "pbf" => "application/x-protobuf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    };
    let gzipped = data.starts_with(&GZIP_MAGIC);
    let mut response = ([(header::CONTENT_TYPE, content_type)], data).into_response();
    if gzipped {
        response
            .headers_mut()
            .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xyz_rows_flip_to_tms() {
        assert_eq!(tms_row(0, 0, 0), Some(0));
        assert_eq!(tms_row(1, 0, 0), Some(1));
        assert_eq!(tms_row(3, 5, 2), Some(5));
        assert_eq!(tms_row(1, 2, 0), None);
        assert_eq!(tms_row(31, 0, 0), None);
    }

    #[test]
    fn metadata_floats_need_exact_arity() {
        assert_eq!(parse_floats::<3>("11.5, 48.1, 4"), Some([11.5, 48.1, 4.0]));
        assert_eq!(parse_floats::<4>("-180,-85,180"), None);
        assert_eq!(parse_floats::<3>("1,2,3,4"), None);
        assert_eq!(parse_floats::<3>("a,b,c"), None);
    }

    #[test]
    fn gzipped_tiles_announce_their_encoding() {
        let response = tile_response("pbf", vec![0x1f, 0x8b, 0x08]);
        assert_eq!(
            response.headers().get(header::CONTENT_ENCODING),
            Some(&HeaderValue::from_static("gzip"))
        );
        let plain = tile_response("png", vec![0x89, b'P']);
        assert!(plain.headers().get(header::CONTENT_ENCODING).is_none());
        assert_eq!(
            plain.headers().get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("image/png"))
        );
    }
}
