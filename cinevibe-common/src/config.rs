//! Configuration loading and resolution
//!
//! Every setting is resolved in this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Tiers 1 and 2 arrive together as [`ConfigOverrides`] (the binary's clap
//! parser reads both). Tier 3 is [`TomlConfig`].

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:5174,http://localhost:3000";
pub const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const DEV_JWT_SECRET: &str = "cinevibe-dev-secret-change-me";

/// On-disk TOML configuration (all fields optional)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerSection,
    pub auth: AuthSection,
    pub tmdb: TmdbSection,
    pub kafka: KafkaSection,
    pub clickhouse: ClickHouseSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub database_path: Option<PathBuf>,
    pub cors_origins: Option<String>,
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub jwt_secret: Option<String>,
    pub jwt_expiry_hours: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TmdbSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KafkaSection {
    pub enabled: Option<bool>,
    pub brokers: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClickHouseSection {
    pub enabled: Option<bool>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub database_path: Option<PathBuf>,
    pub jwt_secret: Option<String>,
    pub jwt_expiry_hours: Option<i64>,
    pub cors_origins: Option<String>,
    pub static_dir: Option<PathBuf>,
    pub tmdb_api_key: Option<String>,
    pub tmdb_base_url: Option<String>,
    pub kafka_enabled: Option<bool>,
    pub kafka_brokers: Option<String>,
    pub kafka_client_id: Option<String>,
    pub clickhouse_enabled: Option<bool>,
    pub clickhouse_host: Option<String>,
    pub clickhouse_port: Option<u16>,
    pub clickhouse_user: Option<String>,
    pub clickhouse_password: Option<String>,
    pub clickhouse_database: Option<String>,
}

/// TMDB import settings
#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

/// Message bus settings
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub enabled: bool,
    pub brokers: Vec<String>,
    pub client_id: String,
}

/// Columnar analytics store settings
#[derive(Debug, Clone)]
pub struct ClickHouseConfig {
    pub enabled: bool,
    pub url: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// Fully resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: String,
    pub database_path: PathBuf,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub cors_origins: Vec<String>,
    pub static_dir: Option<PathBuf>,
    pub tmdb: TmdbConfig,
    pub kafka: KafkaConfig,
    pub clickhouse: ClickHouseConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::resolve(ConfigOverrides::default(), TomlConfig::default())
    }
}

impl ServerConfig {
    /// Merge overrides over the TOML file over compiled defaults
    pub fn resolve(cli: ConfigOverrides, file: TomlConfig) -> Self {
        let jwt_secret = cli
            .jwt_secret
            .or(file.auth.jwt_secret)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                warn!("JWT_SECRET not set, using development secret");
                DEV_JWT_SECRET.to_string()
            });

        let ch_host = cli
            .clickhouse_host
            .or(file.clickhouse.host)
            .unwrap_or_else(|| "localhost".to_string());
        let ch_port = cli.clickhouse_port.or(file.clickhouse.port).unwrap_or(8123);

        Self {
            port: cli.port.or(file.server.port).unwrap_or(DEFAULT_PORT),
            bind: cli
                .bind
                .or(file.server.bind)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            database_path: cli
                .database_path
                .or(file.server.database_path)
                .unwrap_or_else(default_database_path),
            jwt_secret,
            jwt_expiry_hours: cli
                .jwt_expiry_hours
                .or(file.auth.jwt_expiry_hours)
                .unwrap_or(24),
            cors_origins: split_list(
                &cli.cors_origins
                    .or(file.server.cors_origins)
                    .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string()),
            ),
            static_dir: cli.static_dir.or(file.server.static_dir),
            tmdb: TmdbConfig {
                api_key: cli
                    .tmdb_api_key
                    .or(file.tmdb.api_key)
                    .filter(|k| !k.trim().is_empty()),
                base_url: cli
                    .tmdb_base_url
                    .or(file.tmdb.base_url)
                    .unwrap_or_else(|| DEFAULT_TMDB_BASE_URL.to_string()),
            },
            kafka: KafkaConfig {
                enabled: cli.kafka_enabled.or(file.kafka.enabled).unwrap_or(false),
                brokers: split_list(
                    &cli.kafka_brokers
                        .or(file.kafka.brokers)
                        .unwrap_or_else(|| "localhost:9092".to_string()),
                ),
                client_id: cli
                    .kafka_client_id
                    .or(file.kafka.client_id)
                    .unwrap_or_else(|| "cinevibe-backend".to_string()),
            },
            clickhouse: ClickHouseConfig {
                enabled: cli
                    .clickhouse_enabled
                    .or(file.clickhouse.enabled)
                    .unwrap_or(false),
                url: format!("http://{}:{}", ch_host, ch_port),
                user: cli
                    .clickhouse_user
                    .or(file.clickhouse.user)
                    .unwrap_or_else(|| "default".to_string()),
                password: cli
                    .clickhouse_password
                    .or(file.clickhouse.password)
                    .unwrap_or_default(),
                database: cli
                    .clickhouse_database
                    .or(file.clickhouse.database)
                    .unwrap_or_else(|| "analytics".to_string()),
            },
        }
    }
}

/// Split a comma separated list, dropping blanks
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load the TOML config file
///
/// An explicit path must exist and parse. Without one, the platform default
/// location is tried and a missing file yields the empty config.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => {
                info!("No config file found, using environment and defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
    let config = toml::from_str::<TomlConfig>(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Platform config file location (`~/.config/cinevibe/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cinevibe").join("config.toml"))
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cinevibe"))
        .unwrap_or_else(|| PathBuf::from("./cinevibe_data"))
        .join("cinevibe.db")
}
