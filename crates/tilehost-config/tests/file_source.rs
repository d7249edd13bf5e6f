//! Loading configuration documents from disk.

use std::fs;

use tilehost_config::{ConfigError, ConfigSource, FileConfigSource, FrontPage};

fn write_layout(root: &std::path::Path) {
    fs::create_dir_all(root.join("styles")).expect("styles dir");
    fs::create_dir_all(root.join("fonts")).expect("fonts dir");
    fs::create_dir_all(root.join("tiles")).expect("tiles dir");
}

#[tokio::test]
async fn loads_document_relative_to_its_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_layout(dir.path());
    let config_path = dir.path().join("config.json");
    fs::write(
        &config_path,
        r#"{
            "options": {
                "paths": { "styles": "styles", "fonts": "fonts", "archives": "tiles" },
                "frontPage": false
            },
            "styles": { "basic": { "style": "basic.json", "serveRendered": false } },
            "archives": { "world": { "path": "world.mbtiles" } }
        }"#,
    )
    .expect("config written");

    let source = FileConfigSource::new(&config_path);
    let config = source.load().await.expect("config loads");

    assert_eq!(config.options.paths.root, dir.path());
    assert_eq!(config.options.front_page, FrontPage::Disabled);
    assert_eq!(
        config.styles["basic"].document,
        dir.path().join("styles/basic.json")
    );
    assert!(!config.styles["basic"].serve_rendered);
    assert_eq!(
        config.archives["world"].path,
        dir.path().join("tiles/world.mbtiles")
    );
}

#[tokio::test]
async fn every_load_reads_the_file_again() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_layout(dir.path());
    let config_path = dir.path().join("config.json");
    let source = FileConfigSource::new(&config_path);

    fs::write(&config_path, r#"{"archives": {"a": {"path": "a.mbtiles"}}}"#).expect("first");
    assert_eq!(source.load().await.expect("first load").archives.len(), 1);

    fs::write(&config_path, r#"{"archives": {}}"#).expect("second");
    assert!(source.load().await.expect("second load").archives.is_empty());
}

#[tokio::test]
async fn missing_roots_and_files_are_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("config.json");

    let missing_file = FileConfigSource::new(&config_path).load().await;
    assert!(matches!(missing_file, Err(ConfigError::Read { .. })));

    fs::write(
        &config_path,
        r#"{"options": {"paths": {"fonts": "does-not-exist"}}}"#,
    )
    .expect("config written");
    let missing_root = FileConfigSource::new(&config_path).load().await;
    assert!(matches!(
        missing_root,
        Err(ConfigError::MissingPath { field: "fonts", .. })
    ));

    fs::write(&config_path, "{ not json").expect("config written");
    let malformed = FileConfigSource::new(&config_path).load().await;
    assert!(matches!(malformed, Err(ConfigError::Parse { .. })));
}
