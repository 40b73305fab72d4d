//! cinevibe-server library - review aggregation REST API
//!
//! Exposes [`build_router`] and [`AppState`] so the binary and the
//! integration tests assemble the same application.

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use cinevibe_common::config::ServerConfig;
use cinevibe_common::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod analytics;
pub mod api;
pub mod auth;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;

use analytics::AnalyticsHub;
use auth::JwtKeys;
use services::tmdb::TmdbClient;

/// Capacity of the in-process analytics event bus
pub const EVENT_BUS_CAPACITY: usize = 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub config: Arc<ServerConfig>,
    pub jwt: Arc<JwtKeys>,
    /// Analytics events emitted by handlers
    pub events: EventBus,
    pub analytics: Arc<AnalyticsHub>,
    pub tmdb: Arc<TmdbClient>,
}

impl AppState {
    /// State with analytics sinks disabled
    pub fn new(db: SqlitePool, config: ServerConfig) -> anyhow::Result<Self> {
        let jwt = JwtKeys::new(&config.jwt_secret, config.jwt_expiry_hours);
        let tmdb = TmdbClient::new(&config.tmdb)?;

        Ok(Self {
            db,
            jwt: Arc::new(jwt),
            events: EventBus::new(EVENT_BUS_CAPACITY),
            analytics: Arc::new(AnalyticsHub::disabled()),
            tmdb: Arc::new(tmdb),
            config: Arc::new(config),
        })
    }

    pub fn with_analytics(mut self, hub: Arc<AnalyticsHub>) -> Self {
        self.analytics = hub;
        self
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            middleware::REQUEST_ID_HEADER.clone(),
        ])
        .allow_credentials(true)
}

/// Build application router
///
/// Layer order, outermost first: CORS, trace, request id, identity, access log.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .nest("/auth", api::auth::routes())
        .nest("/users", api::users::routes())
        .nest("/content", api::content::routes())
        .nest("/reviews", api::reviews::routes())
        .nest("/gamification", api::gamification::routes())
        .nest("/critics", api::critics::routes())
        .nest("/expectations", api::expectations::routes())
        .nest("/recommendations", api::recommendations::routes())
        .nest("/admin", api::admin::routes())
        .nest("/analytics", api::analytics::routes())
        .route("/buildinfo", axum::routing::get(api::buildinfo::get_build_info));

    let mut app = Router::new()
        .nest("/api", api_routes)
        .merge(api::health_routes());

    if let Some(dir) = &state.config.static_dir {
        let index = dir.join("index.html");
        app = app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    let cors = cors_layer(&state.config.cors_origins);

    app.layer(from_fn(middleware::log_requests))
        .layer(from_fn_with_state(state.clone(), auth::identity_middleware))
        .layer(from_fn(middleware::request_id))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
