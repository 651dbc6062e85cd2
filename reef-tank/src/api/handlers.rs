//! HTTP request handlers
//!
//! Tile control mirrors what a click or slider drag does on the page: a tile
//! whose controls are locked (loading, fading out) refuses the action with
//! 409 Conflict.

use crate::api::server::AppContext;
use crate::error::Error;
use crate::scene::background::{LayerView, ScrollPosition};
use crate::scene::fish::{FishFrame, Viewport};
use crate::tile::board::TileView;
use crate::tile::element::TileElement;
use crate::tile::node::AudioNode;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use reef_common::{time, volume};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_timestamp: String,
    started_at: String,
    tiles: usize,
    connected_outputs: usize,
    output_peak: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToggleRequest {
    /// When the triggering click happened (Unix epoch milliseconds)
    pub event_time_ms: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    /// Linear gain, 0.0-1.0
    pub volume: Option<f32>,
    /// Slider position to show, 0-100
    pub display: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct TileActionResponse {
    /// False when a stale toggle was dropped
    pub accepted: bool,
    pub tile: TileView,
}

#[derive(Debug, Deserialize)]
pub struct FishQuery {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct FishResponse {
    pub now_ms: f64,
    pub width: f64,
    pub fish: Vec<FishFrame>,
}

type ApiError = (StatusCode, Json<StatusResponse>);
type ApiResult<T> = Result<T, ApiError>;

fn api_error(code: StatusCode, message: impl Into<String>) -> ApiError {
    (
        code,
        Json(StatusResponse {
            status: format!("error: {}", message.into()),
        }),
    )
}

/// Status code for an error surfaced by a tile operation
fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::AssetUnavailable(_) | Error::Fetch { .. } => StatusCode::BAD_GATEWAY,
        Error::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        Error::Tile(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn from_error(error: Error) -> ApiError {
    warn!("Tile operation failed: {}", error);
    api_error(status_for(&error), error.to_string())
}

fn lookup(ctx: &AppContext, id: &str) -> ApiResult<(Arc<dyn TileElement>, Arc<AudioNode>)> {
    ctx.state
        .board
        .get(id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("no tile '{}'", id)))
}

fn require_button(element: &dyn TileElement) -> ApiResult<()> {
    if element.button_enabled() {
        Ok(())
    } else {
        Err(api_error(
            StatusCode::CONFLICT,
            format!("tile '{}' is busy", element.id()),
        ))
    }
}

fn view(ctx: &AppContext, id: &str) -> ApiResult<TileView> {
    ctx.state
        .board
        .view(id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("no tile '{}'", id)))
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    let destination = ctx.state.audio.destination();
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "reef-tank".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        started_at: ctx.state.started_at.to_rfc3339(),
        tiles: ctx.state.board.len(),
        connected_outputs: destination.active_connections(),
        output_peak: destination.last_peak(),
    })
}

// ============================================================================
// Tile Endpoints
// ============================================================================

/// GET /tiles - Every tile with its node status
pub async fn list_tiles(State(ctx): State<AppContext>) -> Json<Vec<TileView>> {
    Json(ctx.state.board.views())
}

/// GET /tiles/:id
pub async fn get_tile(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<TileView>> {
    view(&ctx, &id).map(Json)
}

/// POST /tiles/:id/toggle - Play or stop, as a click would
///
/// Returns 202 with `accepted: false` when the click is too old.
pub async fn toggle_tile(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    body: Option<Json<ToggleRequest>>,
) -> ApiResult<(StatusCode, Json<TileActionResponse>)> {
    let (element, node) = lookup(&ctx, &id)?;
    require_button(element.as_ref())?;

    let request = body.map(|Json(r)| r).unwrap_or_default();
    let event_time = match request.event_time_ms {
        Some(ms) => Some(time::from_unix_millis(ms).ok_or_else(|| {
            api_error(StatusCode::BAD_REQUEST, format!("invalid event time {}", ms))
        })?),
        None => None,
    };

    let accepted = node.toggle(event_time).await.map_err(from_error)?;
    let code = if accepted {
        StatusCode::OK
    } else {
        debug!("Dropped stale toggle for tile {}", id);
        StatusCode::ACCEPTED
    };

    Ok((
        code,
        Json(TileActionResponse {
            accepted,
            tile: view(&ctx, &id)?,
        }),
    ))
}

/// POST /tiles/:id/play
pub async fn play_tile(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<TileActionResponse>> {
    let (element, node) = lookup(&ctx, &id)?;
    require_button(element.as_ref())?;

    node.play().await.map_err(from_error)?;
    Ok(Json(TileActionResponse {
        accepted: true,
        tile: view(&ctx, &id)?,
    }))
}

/// POST /tiles/:id/stop
pub async fn stop_tile(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<TileActionResponse>> {
    let (element, node) = lookup(&ctx, &id)?;
    require_button(element.as_ref())?;

    node.stop().await.map_err(from_error)?;
    Ok(Json(TileActionResponse {
        accepted: true,
        tile: view(&ctx, &id)?,
    }))
}

/// POST /tiles/:id/volume - Slider moved
///
/// With only `display`, the gain is derived from the slider position.
pub async fn set_tile_volume(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(request): Json<VolumeRequest>,
) -> ApiResult<Json<TileView>> {
    let (element, node) = lookup(&ctx, &id)?;
    if !element.slider_enabled() {
        return Err(api_error(
            StatusCode::CONFLICT,
            format!("tile '{}' slider is locked", id),
        ));
    }

    if let Some(display) = request.display {
        if !(0.0..=100.0).contains(&display) {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!("display {} outside 0-100", display),
            ));
        }
    }

    let gain = match (request.volume, request.display) {
        (Some(v), _) if (0.0..=1.0).contains(&v) => v,
        (Some(v), _) => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!("volume {} outside 0.0-1.0", v),
            ))
        }
        (None, Some(display)) => volume::gain_from_slider(display),
        (None, None) => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "volume or display required",
            ))
        }
    };

    node.adjust_volume(gain, request.display);
    view(&ctx, &id).map(Json)
}

// ============================================================================
// Scene Endpoints
// ============================================================================

/// GET /scene/fish - Where every fish is right now
pub async fn get_fish(
    State(ctx): State<AppContext>,
    Query(query): Query<FishQuery>,
) -> ApiResult<Json<FishResponse>> {
    if let (Some(width), Some(height)) = (query.width, query.height) {
        if width <= 0.0 || height <= 0.0 {
            return Err(api_error(StatusCode::BAD_REQUEST, "viewport must be positive"));
        }
        ctx.state.school.write().resize(Viewport::new(width, height));
    }

    let width = query.width.unwrap_or(crate::state::DEFAULT_VIEWPORT.width);
    let now_ms = chrono::Utc::now().timestamp_millis() as f64;
    let fish = ctx.state.school.read().frame(now_ms, width);

    Ok(Json(FishResponse {
        now_ms,
        width,
        fish,
    }))
}

/// GET /scene/background
pub async fn get_background(State(ctx): State<AppContext>) -> Json<Vec<LayerView>> {
    Json(ctx.state.layers.snapshot())
}

/// POST /scene/scroll - Report a scroll position
///
/// Applied on the next animation frame, so the response is 202.
pub async fn scroll(
    State(ctx): State<AppContext>,
    Json(position): Json<ScrollPosition>,
) -> ApiResult<(StatusCode, Json<StatusResponse>)> {
    if position.window_height <= 0.0 {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "window_height must be positive",
        ));
    }
    ctx.state.scroller.scroll(position);
    Ok((
        StatusCode::ACCEPTED,
        Json(StatusResponse {
            status: "scheduled".to_string(),
        }),
    ))
}
