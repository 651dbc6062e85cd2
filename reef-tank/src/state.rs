//! Shared scene state
//!
//! Everything the HTTP handlers reach: the tile board, the fish school, the
//! background layers, and the event bus that mirrors every change.

use crate::audio::graph::AudioContext;
use crate::error::Result;
use crate::scene::background::{BackgroundScroller, MirrorLayers, FRAME_INTERVAL};
use crate::scene::fish::{School, Viewport};
use crate::tile::board::TileBoard;
use crate::tile::node::{NodeContext, NodeSettings};
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reef_common::config::SceneConfig;
use reef_common::events::{EventBus, ReefEvent};
use std::sync::Arc;
use tracing::info;

/// Viewport fish are sized for until a client reports its own
pub const DEFAULT_VIEWPORT: Viewport = Viewport {
    width: 1280.0,
    height: 720.0,
};

pub struct SharedState {
    pub events: EventBus,
    pub audio: Arc<AudioContext>,
    pub board: TileBoard,
    pub school: RwLock<School>,
    pub layers: Arc<MirrorLayers>,
    pub scroller: BackgroundScroller,
    pub started_at: DateTime<Utc>,
}

impl SharedState {
    /// Assemble the scene. Must be called inside a tokio runtime.
    pub fn new(
        config: &SceneConfig,
        audio: Arc<AudioContext>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let events = EventBus::new(config.server.event_capacity);

        let node_ctx = NodeContext {
            audio: Arc::clone(&audio),
            transport,
            settings: NodeSettings::from_config(&config.audio),
            events: Some(events.clone()),
        };
        let board = TileBoard::from_config(node_ctx, &config.tiles)?;

        let now_ms = Utc::now().timestamp_millis() as f64;
        let school = School::spawn(
            &config.fish,
            DEFAULT_VIEWPORT,
            now_ms,
            &mut rand::thread_rng(),
        );

        let layers = Arc::new(MirrorLayers::new(
            config.background.layers.clone(),
            Some(events.clone()),
        ));
        let scroller = BackgroundScroller::start(layers.clone(), FRAME_INTERVAL);

        info!(
            "Scene ready: {} tile(s), {} fish, {} background layer(s)",
            board.len(),
            school.len(),
            config.background.layers.len()
        );

        Ok(Self {
            events,
            audio,
            board,
            school: RwLock::new(school),
            layers,
            scroller,
            started_at: Utc::now(),
        })
    }

    /// Tear the scene down: every audio node, then the scroll task
    pub fn shutdown(&self) {
        info!("Shutting down scene");
        self.events.emit_lossy(ReefEvent::SceneShutdown {
            timestamp: Utc::now(),
        });
        self.board.shutdown_all();
        self.scroller.stop();
    }
}
