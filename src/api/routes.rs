//! API route definitions

use super::handlers;
use crate::sync::ws;
use crate::AppState;
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Uploaded assets referenced by documents as
    // /projects/{type}/{sanitized_name}_assets/{file}
    let assets = ServeDir::new(state.store.projects_root().to_path_buf());

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // On-demand analytics (memoized by TTL)
        .route("/api/analytics", get(handlers::analytics))
        // Session channel
        .route("/ws", get(ws::ws_session))
        .nest_service("/projects", assets)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
