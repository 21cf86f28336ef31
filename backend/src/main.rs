//! Liquor Inventory - Closing Stock Gateway
//!
//! Sits between the dashboard and the liquor-shop inventory API: resolves
//! shop and category registries, normalizes closing stock into a per-size
//! grid, and serves filtered pages, totals and spreadsheet exports.

use axum::{routing::get, Router};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod external;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;

pub use config::Config;

use external::StockApiClient;
use services::{AuthService, RegistryCache, RegistryService, SnapshotCache, StockService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: AuthService,
    pub registry: RegistryService,
    pub stock: StockService,
}

impl AppState {
    /// Wire the upstream client, caches and services from configuration
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let client = StockApiClient::new(
            config.upstream.base_url.clone(),
            Duration::from_secs(config.upstream.timeout_secs),
            config.dashboard.all_shops_id,
        )?;

        let registry = RegistryService::new(
            client.clone(),
            RegistryCache::new(Duration::from_secs(config.dashboard.registry_ttl_secs)),
        );
        let stock = StockService::new(
            client.clone(),
            registry.clone(),
            SnapshotCache::new(Duration::from_secs(config.dashboard.snapshot_ttl_secs)),
            config.dashboard.clone(),
        );

        Ok(Self {
            auth: AuthService::new(client),
            registry,
            stock,
            config: Arc::new(config),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "liquor_inventory_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::load()?;

    tracing::info!("Starting Liquor Inventory Closing Stock Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("Upstream API: {}", config.upstream.base_url);

    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));

    // Create application state
    let state = AppState::from_config(config)?;

    // Build application
    let app = create_app(state);

    // Start server
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes and middleware
fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api/v1", routes::api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Liquor Inventory Closing Stock API v1.0"
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
