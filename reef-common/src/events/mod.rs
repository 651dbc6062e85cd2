//! Event types for the Reef event system
//!
//! Provides shared event definitions and the EventBus used to feed SSE clients.

mod tile_types;

pub use tile_types::{ElementSnapshot, LoadState, TileColor, TileStatus};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Reef event types
///
/// Every mirrored UI change is published as one of these and can be
/// serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReefEvent {
    /// A tile element's colour, controls or slider changed
    TileElementChanged {
        element: ElementSnapshot,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An audio node's load state, playing flag, error flag or volume changed
    TileStateChanged {
        status: TileStatus,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Background layer activity changed after a scroll
    BackgroundChanged {
        /// One flag per layer, top layer first
        active: Vec<bool>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Host is tearing the scene down
    SceneShutdown {
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ReefEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            ReefEvent::TileElementChanged { .. } => "TileElementChanged",
            ReefEvent::TileStateChanged { .. } => "TileStateChanged",
            ReefEvent::BackgroundChanged { .. } => "BackgroundChanged",
            ReefEvent::SceneShutdown { .. } => "SceneShutdown",
        }
    }
}

/// Central event distribution bus
///
/// Wraps `tokio::broadcast`: publishing never blocks, slow subscribers see
/// `Lagged` instead of stalling producers, and dropped receivers clean up
/// automatically.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReefEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ReefEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: ReefEvent) -> Result<usize, broadcast::error::SendError<ReefEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ReefEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_state_ordering() {
        assert!(LoadState::Unloaded < LoadState::FetchStarted);
        assert!(LoadState::GainNodeCreated < LoadState::Ready);
        assert_eq!(LoadState::Ready.ordinal(), 5);
        assert_eq!(LoadState::FetchStarted.ordinal(), 1);
        assert!(LoadState::Ready.is_ready());
        assert!(!LoadState::GainNodeCreated.is_ready());
    }

    #[test]
    fn test_tile_colors() {
        assert_eq!(TileColor::Loading.css(), "#8800cc");
        assert_eq!(TileColor::Error.css(), "#ff0000");
        assert_eq!(TileColor::Playing.css(), "#999999");
        assert_eq!(TileColor::Stopped.css(), "#555555");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = ReefEvent::BackgroundChanged {
            active: vec![true, false],
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "BackgroundChanged");
        assert_eq!(json["active"][0], true);
        assert_eq!(event.event_type(), "BackgroundChanged");
    }

    #[tokio::test]
    async fn test_event_bus_delivers_to_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(ReefEvent::SceneShutdown { timestamp: chrono::Utc::now() }).is_err());

        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        bus.emit_lossy(ReefEvent::SceneShutdown { timestamp: chrono::Utc::now() });

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, ReefEvent::SceneShutdown { .. }));
    }
}
