// ==============================================================================
// router.rs - Axum Router Assembly
// ==============================================================================
// Description: Wire the health endpoint and the catch-all proxy handler
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{handlers, state::AppState};

/// Path reserved for the gateway's own health endpoint
pub const HEALTH_PATH: &str = "/_gateway/health";

pub fn build_router(state: AppState) -> Router {
    // No body limit layer: proxied bodies are streamed, never extracted
    Router::new()
        .route(HEALTH_PATH, get(handlers::health_check))
        .fallback(handlers::gateway)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
