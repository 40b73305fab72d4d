//! cinevibe-server - review aggregation REST API
//!
//! Startup order: environment, logging, configuration, database, admin
//! bootstrap, analytics sinks, HTTP listener.

use anyhow::{Context, Result};
use clap::Parser;
use cinevibe_common::config::{load_toml_config, ConfigOverrides, ServerConfig};
use cinevibe_common::db::init_database;
use cinevibe_server::analytics::{spawn_fanout, AnalyticsHub};
use cinevibe_server::auth::{ensure_admin, AdminSeed};
use cinevibe_server::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cinevibe-server
///
/// Every flag falls back to its environment variable, then to the TOML file.
#[derive(Parser, Debug)]
#[command(name = "cinevibe-server")]
#[command(about = "Review aggregation API for movies, series and games")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "CINEVIBE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    #[arg(long, env = "BIND_ADDRESS")]
    bind: Option<String>,

    /// SQLite database file
    #[arg(long, env = "CINEVIBE_DB")]
    database_path: Option<PathBuf>,

    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    #[arg(long, env = "JWT_EXPIRY_HOURS")]
    jwt_expiry_hours: Option<i64>,

    /// Comma separated allowed origins
    #[arg(long, env = "CORS_ORIGINS")]
    cors_origins: Option<String>,

    /// Built frontend to serve at `/`
    #[arg(long, env = "STATIC_DIR")]
    static_dir: Option<PathBuf>,

    #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
    tmdb_api_key: Option<String>,

    #[arg(long, env = "TMDB_BASE_URL")]
    tmdb_base_url: Option<String>,

    #[arg(long, env = "KAFKA_ENABLED")]
    kafka_enabled: Option<bool>,

    #[arg(long, env = "KAFKA_BROKERS")]
    kafka_brokers: Option<String>,

    #[arg(long, env = "KAFKA_CLIENT_ID")]
    kafka_client_id: Option<String>,

    #[arg(long, env = "CLICKHOUSE_ENABLED")]
    clickhouse_enabled: Option<bool>,

    #[arg(long, env = "CLICKHOUSE_HOST")]
    clickhouse_host: Option<String>,

    #[arg(long, env = "CLICKHOUSE_PORT")]
    clickhouse_port: Option<u16>,

    #[arg(long, env = "CLICKHOUSE_USER")]
    clickhouse_user: Option<String>,

    #[arg(long, env = "CLICKHOUSE_PASSWORD", hide_env_values = true)]
    clickhouse_password: Option<String>,

    #[arg(long, env = "CLICKHOUSE_DATABASE")]
    clickhouse_database: Option<String>,
}

impl Args {
    fn overrides(self) -> (Option<PathBuf>, ConfigOverrides) {
        let overrides = ConfigOverrides {
            port: self.port,
            bind: self.bind,
            database_path: self.database_path,
            jwt_secret: self.jwt_secret,
            jwt_expiry_hours: self.jwt_expiry_hours,
            cors_origins: self.cors_origins,
            static_dir: self.static_dir,
            tmdb_api_key: self.tmdb_api_key,
            tmdb_base_url: self.tmdb_base_url,
            kafka_enabled: self.kafka_enabled,
            kafka_brokers: self.kafka_brokers,
            kafka_client_id: self.kafka_client_id,
            clickhouse_enabled: self.clickhouse_enabled,
            clickhouse_host: self.clickhouse_host,
            clickhouse_port: self.clickhouse_port,
            clickhouse_user: self.clickhouse_user,
            clickhouse_password: self.clickhouse_password,
            clickhouse_database: self.clickhouse_database,
        };
        (self.config, overrides)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinevibe_server=info,cinevibe_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting CineVibe server (cinevibe-server) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let (config_path, overrides) = Args::parse().overrides();
    let file = load_toml_config(config_path.as_deref()).context("Failed to load configuration")?;
    let config = ServerConfig::resolve(overrides, file);
    info!("Database path: {}", config.database_path.display());

    let pool = match init_database(&config.database_path).await {
        Ok(pool) => {
            info!("Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    match AdminSeed::from_env() {
        Some(seed) => {
            let id = ensure_admin(&pool, &seed)
                .await
                .context("Failed to bootstrap admin account")?;
            info!("Admin account '{}' ready (id {})", seed.username, id);
        }
        None => warn!("ADMIN_USERNAME/ADMIN_EMAIL/ADMIN_PASSWORD not set, skipping admin bootstrap"),
    }

    let hub = Arc::new(AnalyticsHub::connect(&config).await);
    let addr = format!("{}:{}", config.bind, config.port);

    let state = AppState::new(pool, config)?.with_analytics(hub.clone());
    let fanout = spawn_fanout(state.events.subscribe(), hub);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("cinevibe-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    fanout.abort();
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
