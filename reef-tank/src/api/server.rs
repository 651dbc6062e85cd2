//! HTTP server setup and routing
//!
//! Sets up the Axum router with tile control, scene, and SSE endpoints.

use crate::error::{Error, Result};
use crate::state::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
}

/// Build the router with every route attached
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Tiles
        .route("/tiles", get(super::handlers::list_tiles))
        .route("/tiles/:id", get(super::handlers::get_tile))
        .route("/tiles/:id/toggle", post(super::handlers::toggle_tile))
        .route("/tiles/:id/play", post(super::handlers::play_tile))
        .route("/tiles/:id/stop", post(super::handlers::stop_tile))
        .route("/tiles/:id/volume", post(super::handlers::set_tile_volume))
        // Scene
        .route("/scene/fish", get(super::handlers::get_fish))
        .route("/scene/background", get(super::handlers::get_background))
        .route("/scene/scroll", post(super::handlers::scroll))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Serve the API on `bind` until `shutdown` resolves
pub async fn run<F>(bind: &str, ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", bind, e)))?;
    info!("HTTP server listening on {}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
