//! Configuration resolution tests
//!
//! Priority order: CLI/env overrides > TOML file > compiled defaults.
//! Tests that touch XDG_CONFIG_HOME are `#[serial]` to avoid env races.

use cinevibe_common::config::{
    load_toml_config, split_list, ConfigOverrides, ServerConfig, TomlConfig, DEFAULT_PORT,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

fn toml(content: &str) -> TomlConfig {
    toml::from_str(content).expect("valid TOML")
}

#[test]
fn test_defaults_when_nothing_configured() {
    let config = ServerConfig::resolve(ConfigOverrides::default(), TomlConfig::default());

    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.bind, "0.0.0.0");
    assert_eq!(config.jwt_expiry_hours, 24);
    assert_eq!(
        config.cors_origins,
        vec![
            "http://localhost:5173".to_string(),
            "http://localhost:5174".to_string(),
            "http://localhost:3000".to_string(),
        ]
    );
    assert!(!config.jwt_secret.is_empty());
    assert!(config.tmdb.api_key.is_none());
    assert_eq!(config.tmdb.base_url, "https://api.themoviedb.org/3");
    assert!(config.database_path.ends_with("cinevibe.db"));
}

#[test]
fn test_analytics_sidecar_disabled_by_default() {
    let config = ServerConfig::default();

    assert!(!config.kafka.enabled);
    assert_eq!(config.kafka.brokers, vec!["localhost:9092".to_string()]);
    assert_eq!(config.kafka.client_id, "cinevibe-backend");

    assert!(!config.clickhouse.enabled);
    assert_eq!(config.clickhouse.url, "http://localhost:8123");
    assert_eq!(config.clickhouse.user, "default");
    assert_eq!(config.clickhouse.database, "analytics");
}

#[test]
fn test_toml_overrides_defaults() {
    let file = toml(
        r#"
        [server]
        port = 9000
        cors_origins = "https://cinevibe.example"

        [auth]
        jwt_secret = "from-file"

        [clickhouse]
        enabled = true
        host = "ch.internal"
        port = 9123
        "#,
    );

    let config = ServerConfig::resolve(ConfigOverrides::default(), file);

    assert_eq!(config.port, 9000);
    assert_eq!(config.cors_origins, vec!["https://cinevibe.example".to_string()]);
    assert_eq!(config.jwt_secret, "from-file");
    assert!(config.clickhouse.enabled);
    assert_eq!(config.clickhouse.url, "http://ch.internal:9123");
}

#[test]
fn test_cli_overrides_toml() {
    let file = toml(
        r#"
        [server]
        port = 9000
        database_path = "/var/lib/cinevibe/file.db"

        [kafka]
        brokers = "file-broker:9092"
        "#,
    );
    let cli = ConfigOverrides {
        port: Some(7000),
        database_path: Some(PathBuf::from("/tmp/cli.db")),
        kafka_brokers: Some("a:9092, b:9092".to_string()),
        ..Default::default()
    };

    let config = ServerConfig::resolve(cli, file);

    assert_eq!(config.port, 7000);
    assert_eq!(config.database_path, PathBuf::from("/tmp/cli.db"));
    assert_eq!(config.kafka.brokers, vec!["a:9092".to_string(), "b:9092".to_string()]);
}

#[test]
fn test_blank_tmdb_key_counts_as_missing() {
    let cli = ConfigOverrides {
        tmdb_api_key: Some("   ".to_string()),
        ..Default::default()
    };
    let config = ServerConfig::resolve(cli, TomlConfig::default());
    assert!(config.tmdb.api_key.is_none());
}

#[test]
fn test_split_list_drops_blanks() {
    assert_eq!(split_list(" a, ,b ,"), vec!["a".to_string(), "b".to_string()]);
    assert!(split_list("").is_empty());
}

#[test]
fn test_explicit_config_file_must_exist() {
    let result = load_toml_config(Some(&PathBuf::from("/nonexistent/cinevibe.toml")));
    assert!(result.is_err());
}

#[test]
fn test_explicit_config_file_is_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[tmdb]\napi_key = \"abc\"\n").unwrap();

    let file = load_toml_config(Some(&path)).unwrap();
    assert_eq!(file.tmdb.api_key.as_deref(), Some("abc"));
}

#[test]
fn test_invalid_toml_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[server\nport = ").unwrap();

    assert!(load_toml_config(Some(&path)).is_err());
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_default_location_missing_file_yields_empty_config() {
    let dir = tempfile::tempdir().unwrap();
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let file = load_toml_config(None).unwrap();
    assert!(file.server.port.is_none());

    env::remove_var("XDG_CONFIG_HOME");
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_default_location_is_used_when_present() {
    let dir = tempfile::tempdir().unwrap();
    let cinevibe_dir = dir.path().join("cinevibe");
    std::fs::create_dir_all(&cinevibe_dir).unwrap();
    std::fs::write(cinevibe_dir.join("config.toml"), "[server]\nport = 8181\n").unwrap();
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let file = load_toml_config(None).unwrap();
    assert_eq!(file.server.port, Some(8181));

    env::remove_var("XDG_CONFIG_HOME");
}
