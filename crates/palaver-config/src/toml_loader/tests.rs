//! Tests for TOML config loading, creation, and path resolution.

use super::template::default_config_toml;
use super::*;
use crate::schema::PalaverConfig;
use palaver_common::ConfigError;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_palaver_config.toml"));
    let err = result.unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound(_)));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r##"
[session]
stream_buffer = 8
chars_per_token = 3.5

[archive]
min_exchanges = 3
"##,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.session.stream_buffer, 8);
    assert_eq!(config.session.chars_per_token, 3.5);
    assert_eq!(config.archive.min_exchanges, 3);
    // Defaults preserved
    assert!(config.archive.auto_save);
    assert_eq!(config.models.default_model, "gemini-3-pro-preview");
    assert_eq!(config.models.catalog.len(), 3);
}

#[test]
fn load_custom_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r##"
[models]
default_model = "local"

[[models.catalog]]
id = "local"
max_context_tokens = 8192
max_output_tokens = 1024
"##,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    let catalog = config.models.catalog().unwrap();
    assert_eq!(catalog.default_model(), "local");
    assert_eq!(catalog.budget("local").unwrap().max_context_tokens, 8192);
    assert!(!catalog.contains("gemini-3-pro-preview"));
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}

#[test]
fn load_config_with_invalid_values_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[session]
stream_buffer = 0
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.session.stream_buffer, 64);
}

#[test]
fn create_and_load_default_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("palaver").join("config.toml");

    create_default_config(&path).unwrap();
    assert!(path.exists());

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.models.default_model, "gemini-3-pro-preview");
    assert_eq!(config.models.catalog.len(), 3);
}

#[test]
fn default_config_toml_is_valid() {
    let config: PalaverConfig = toml::from_str(&default_config_toml()).unwrap();
    assert!(crate::validation::validate(&config).is_ok());
    assert_eq!(
        config.models.catalog,
        PalaverConfig::default().models.catalog
    );
}

#[test]
fn default_config_path_is_reasonable() {
    if let Ok(path) = default_config_path() {
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("palaver"));
        assert!(path_str.ends_with("config.toml"));
    }
}

#[test]
fn create_default_config_keeps_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[archive]\nmin_exchanges = 5\n").unwrap();

    create_default_config(&path).unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.archive.min_exchanges, 5);
}
