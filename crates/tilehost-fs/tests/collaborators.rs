//! Filesystem collaborators against real fixtures.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tilehost_config::{FrontPage, ResolvedPaths, ServerOptions, StyleEntry, TileAlias};
use tilehost_core::{
    ArchiveCollaborator, ArchiveReference, ArchiveRequest, ResolvedArchives, StyleCollaborator,
    StyleRequest,
};
use tilehost_fs::{FsArchives, FsStyles};
use tower::ServiceExt;

fn options(root: &Path) -> Arc<ServerOptions> {
    Arc::new(ServerOptions {
        paths: ResolvedPaths {
            root: root.to_path_buf(),
            styles: root.join("styles"),
            fonts: root.join("fonts"),
            sprites: root.join("sprites"),
            archives: root.join("tiles"),
        },
        tile_alias: TileAlias {
            pbf: Some("mvt".into()),
        },
        front_page: FrontPage::Builtin,
        archive_post_process_hook: None,
        public_url: None,
        serve_all_fonts: false,
    })
}

async fn write_mbtiles(path: &Path, format: &str) {
    std::fs::create_dir_all(path.parent().expect("parent")).expect("tiles dir");
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
        )
        .await
        .expect("create archive");
    for statement in [
        "CREATE TABLE metadata (name TEXT, value TEXT)",
        "CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB)",
    ] {
        sqlx::query(statement).execute(&pool).await.expect("schema");
    }
    for (name, value) in [
        ("name", "World"),
        ("format", format),
        ("bounds", "-180,-85,180,85"),
        ("attribution", "© contributors"),
    ] {
        sqlx::query("INSERT INTO metadata (name, value) VALUES (?, ?)")
            .bind(name)
            .bind(value)
            .execute(&pool)
            .await
            .expect("metadata row");
    }
    // z=1, x=0, XYZ y=0 is TMS row 1.
    for (z, x, row, data) in [(0_i64, 0_i64, 0_i64, b"root".to_vec()), (1, 0, 1, b"north-west".to_vec())] {
        sqlx::query("INSERT INTO tiles VALUES (?, ?, ?, ?)")
            .bind(z)
            .bind(x)
            .bind(row)
            .bind(data)
            .execute(&pool)
            .await
            .expect("tile row");
    }
    pool.close().await;
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(
            Request::get(uri)
                .header(header::HOST, "maps.test")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, content_type, body.to_vec())
}

#[tokio::test]
async fn archive_serves_tilejson_and_flipped_tiles() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tiles/world.mbtiles");
    write_mbtiles(&path, "pbf").await;

    let output = FsArchives::new()
        .build(&ArchiveRequest {
            id: "world".into(),
            path: path.clone(),
            options: options(dir.path()),
        })
        .await
        .expect("archive builds");

    assert_eq!(output.descriptor.name, "World");
    assert_eq!(output.descriptor.format, "pbf");
    assert_eq!(output.descriptor.minzoom, 0);
    assert_eq!(output.descriptor.maxzoom, 1);
    assert_eq!(output.descriptor.center, Some([0.0, 0.0, 0.0]));

    let (status, _, body) = get(&output.router, "/data/world.json?key=secret").await;
    assert_eq!(status, StatusCode::OK);
    let tilejson: Value = serde_json::from_slice(&body).expect("tilejson");
    assert_eq!(
        tilejson["tiles"][0],
        "http://maps.test/data/world/{z}/{x}/{y}.mvt?key=secret"
    );
    assert_eq!(tilejson["name"], "World");

    let (status, content_type, body) = get(&output.router, "/data/world/1/0/0.mvt").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/x-protobuf"));
    assert_eq!(body, b"north-west");

    let (status, _, _) = get(&output.router, "/data/world/1/1/1.pbf").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = get(&output.router, "/data/world/0/0/0.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_archive_fails_the_task() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = FsArchives::new()
        .build(&ArchiveRequest {
            id: "ghost".into(),
            path: dir.path().join("tiles/ghost.mbtiles"),
            options: options(dir.path()),
        })
        .await;
    assert!(result.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn post_process_hook_rewrites_tiles() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tiles/world.mbtiles");
    write_mbtiles(&path, "png").await;
    let hook = dir.path().join("upper.sh");
    std::fs::write(
        &hook,
        "#!/bin/sh\nprintf '%s:' \"$TILEHOST_TILE_Z/$TILEHOST_TILE_X/$TILEHOST_TILE_Y\"\ntr a-z A-Z\n",
    )
    .expect("hook");
    std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    let mut with_hook = (*options(dir.path())).clone();
    with_hook.archive_post_process_hook = Some(hook);
    let output = FsArchives::new()
        .build(&ArchiveRequest {
            id: "world".into(),
            path,
            options: Arc::new(with_hook),
        })
        .await
        .expect("archive builds");

    let (status, _, body) = get(&output.router, "/data/world/1/0/0.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"1/0/0:NORTH-WEST");
}

#[cfg(unix)]
#[tokio::test]
async fn post_process_hook_streams_tiles_larger_than_a_pipe_buffer() {
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tiles/world.mbtiles");
    write_mbtiles(&path, "png").await;
    let large = vec![7_u8; 1 << 20];
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(SqliteConnectOptions::new().filename(&path))
        .await
        .expect("reopen archive");
    // z=2, x=0, XYZ y=0 is TMS row 3.
    sqlx::query("INSERT INTO tiles VALUES (2, 0, 3, ?)")
        .bind(large.clone())
        .execute(&pool)
        .await
        .expect("large tile");
    pool.close().await;

    let hook = dir.path().join("passthrough.sh");
    std::fs::write(&hook, "#!/bin/sh\nexec cat\n").expect("hook");
    std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    let mut with_hook = (*options(dir.path())).clone();
    with_hook.archive_post_process_hook = Some(hook);
    let output = FsArchives::new()
        .build(&ArchiveRequest {
            id: "world".into(),
            path,
            options: Arc::new(with_hook),
        })
        .await
        .expect("archive builds");

    let (status, _, body) = tokio::time::timeout(
        Duration::from_secs(10),
        get(&output.router, "/data/world/2/0/0.png"),
    )
    .await
    .expect("hook output is read while the tile is written");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.len(), large.len());
    assert_eq!(body, large);
}

#[tokio::test]
async fn style_references_and_serves_rewritten_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("styles")).expect("styles dir");
    let document = dir.path().join("styles/basic.json");
    std::fs::write(
        &document,
        r#"{
            "version": 8,
            "name": "Basic",
            "sprite": "basic",
            "sources": {
                "osm": { "type": "vector", "url": "mbtiles://europe/world.mbtiles" }
            },
            "layers": [
                { "id": "labels", "type": "symbol", "layout": { "text-font": ["Noto Sans Regular"] } }
            ]
        }"#,
    )
    .expect("style");
    let request = StyleRequest {
        id: "basic".into(),
        entry: StyleEntry {
            document,
            serve_archive: true,
            serve_rendered: false,
        },
        options: options(dir.path()),
    };

    let styles = FsStyles::new();
    let references = styles
        .archive_references(&request)
        .await
        .expect("references");
    let expected = ArchiveReference::Path(dir.path().join("tiles/europe/world.mbtiles"));
    assert_eq!(references, [expected.clone()]);

    let mut resolved = ResolvedArchives::default();
    resolved.push(expected, "world".into());
    let output = styles.build(&request, &resolved).await.expect("style builds");
    assert_eq!(output.descriptor.name, "Basic");
    assert_eq!(output.descriptor.version, 8);
    assert!(!output.descriptor.serve_rendered);
    assert_eq!(output.fonts, ["Noto Sans Regular"]);

    let (status, _, body) = get(&output.router, "/styles/basic/style.json").await;
    assert_eq!(status, StatusCode::OK);
    let served: Value = serde_json::from_slice(&body).expect("style json");
    assert_eq!(served["sources"]["osm"]["url"], "http://maps.test/data/world.json");
    assert_eq!(served["sprite"], "http://maps.test/styles/basic/sprite");

    let (status, _, _) = get(&output.router, "/styles/basic/sprite@2x.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
