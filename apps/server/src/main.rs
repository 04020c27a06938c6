// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Egress-Lite Server - JSON API for escape-route analysis.
//!
//! Grid endpoints are stateless. Graph endpoints share an in-memory cache
//! keyed by grid content; `create-graph` fills it and the path endpoints
//! read from it.
//!
//! # Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `POST /api/v1/apply-wall-buffer` - Buffered grids for a bundle
//! - `POST /api/v1/update-cells` - Apply cell edits, return both grids
//! - `POST /api/v1/update-spaces` - Detected spaces with outlines
//! - `POST /api/v1/detect-exits` - Exterior doors
//! - `POST /api/v1/create-graph` - Build or reuse the routing graph
//! - `POST /api/v1/stair-connections` - Stair links of the cached graph
//! - `POST /api/v1/find-path` - Cheapest path to any goal
//! - `POST /api/v1/escape-route` / `escape-routes` - Per-space analysis

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use egress_lite_processing::{EngineConfig, GraphCache};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

mod config;
mod error;
mod routes;

use config::Config;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<EngineConfig>,
    pub graphs: Arc<GraphCache>,
}

impl AppState {
    pub fn new(config: Config, engine: EngineConfig) -> Self {
        let graphs = GraphCache::new(config.graph_cache_size);
        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            graphs: Arc::new(graphs),
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Builds the router with all endpoints and middleware.
pub fn app(state: AppState) -> Router {
    let config = state.config.clone();
    Router::new()
        // Root endpoint - API information
        .route("/", get(routes::health::info))
        .route("/api/v1/health", get(routes::health::check))
        // Grid endpoints
        .route("/api/v1/apply-wall-buffer", post(routes::grid::apply_wall_buffer))
        .route("/api/v1/update-cells", post(routes::grid::update_cells))
        .route("/api/v1/update-spaces", post(routes::grid::update_spaces))
        .route("/api/v1/detect-exits", post(routes::grid::detect_exits))
        // Graph endpoints
        .route("/api/v1/create-graph", post(routes::graph::create_graph))
        .route("/api/v1/stair-connections", post(routes::graph::stair_connections))
        // Path endpoints
        .route("/api/v1/find-path", post(routes::paths::find_path))
        .route("/api/v1/escape-route", post(routes::paths::escape_route))
        .route("/api/v1/escape-routes", post(routes::paths::escape_routes))
        // Middleware
        .layer(DefaultBodyLimit::max(config.max_body_mb * 1024 * 1024))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config))
        .with_state(state)
}

fn load_engine_config(config: &Config) -> Result<EngineConfig, egress_lite_processing::Error> {
    match &config.engine_config {
        Some(path) => {
            let engine = EngineConfig::from_path(path)?;
            tracing::info!(path = %path, "Loaded engine configuration");
            Ok(engine)
        }
        None => Ok(EngineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tower_http=debug,egress_lite_server=debug".into()),
        )
        .pretty()
        .init();

    let config = Config::from_env();

    tracing::info!(
        port = config.port,
        max_body_mb = config.max_body_mb,
        request_timeout_secs = config.request_timeout_secs,
        worker_threads = config.worker_threads,
        graph_cache_size = config.graph_cache_size,
        "Starting Egress-Lite Server"
    );

    let engine = match load_engine_config(&config) {
        Ok(engine) => engine,
        Err(err) => {
            tracing::error!(error = %err, "Invalid engine configuration");
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()));
        }
    };

    // Initialize rayon thread pool
    if let Err(err) = rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads)
        .build_global()
    {
        tracing::warn!(error = %err, "Rayon thread pool already initialized");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = app(AppState::new(config, engine));

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
