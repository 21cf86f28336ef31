//! Route definitions for the closing stock gateway

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes
        .nest("/auth", auth_routes())
        // Protected routes - shop and category registries
        .merge(registry_routes())
        // Protected routes - closing stock
        .nest("/stock", stock_routes())
}

/// Authentication routes
fn auth_routes() -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(handlers::me))
        .route_layer(middleware::from_fn(auth_middleware));

    Router::new()
        .route("/login", post(handlers::login))
        .merge(protected)
}

/// Registry routes (protected)
fn registry_routes() -> Router<AppState> {
    Router::new()
        .route("/shops", get(handlers::list_shops))
        .route("/categories", get(handlers::list_categories))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Closing stock routes (protected)
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_stock_view))
        .route("/export", get(handlers::export_stock))
        .route_layer(middleware::from_fn(auth_middleware))
}
