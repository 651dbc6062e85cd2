//! Scroll-driven background layers
//!
//! The page stacks one full-height background layer per screen; the layer
//! nearest the current scroll position is active. Scroll positions arrive far
//! more often than the page repaints, so [`BackgroundScroller`] coalesces
//! them and applies at most one update per animation frame.

use parking_lot::Mutex;
use reef_common::events::{EventBus, ReefEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

/// One repaint at 60 Hz
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Layer `i` is active iff `|i - scroll_y / window_height| < 0.5`
pub fn active_layers(scroll_y: f64, window_height: f64, count: usize) -> Vec<bool> {
    if window_height <= 0.0 {
        return vec![false; count];
    }
    let progress = scroll_y / window_height;
    (0..count)
        .map(|i| (i as f64 - progress).abs() < 0.5)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub scroll_y: f64,
    pub window_height: f64,
}

/// Whatever displays the layers
pub trait LayerSurface: Send + Sync {
    fn layer_count(&self) -> usize;

    fn apply(&self, active: &[bool]);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerView {
    pub image: String,
    pub active: bool,
}

/// In-memory layer stack that publishes activity changes
pub struct MirrorLayers {
    images: Vec<String>,
    active: Mutex<Vec<bool>>,
    events: Option<EventBus>,
}

impl MirrorLayers {
    /// Layers start as they would at the top of the page
    pub fn new(images: Vec<String>, events: Option<EventBus>) -> Self {
        let active = active_layers(0.0, 1.0, images.len());
        Self {
            images,
            active: Mutex::new(active),
            events,
        }
    }

    pub fn snapshot(&self) -> Vec<LayerView> {
        let active = self.active.lock();
        self.images
            .iter()
            .zip(active.iter())
            .map(|(image, &active)| LayerView {
                image: image.clone(),
                active,
            })
            .collect()
    }
}

impl LayerSurface for MirrorLayers {
    fn layer_count(&self) -> usize {
        self.images.len()
    }

    fn apply(&self, active: &[bool]) {
        {
            let mut current = self.active.lock();
            if current.as_slice() == active {
                return;
            }
            *current = active.to_vec();
        }
        if let Some(events) = &self.events {
            events.emit_lossy(ReefEvent::BackgroundChanged {
                active: active.to_vec(),
                timestamp: chrono::Utc::now(),
            });
        }
    }
}

/// Frame-throttled scroll handler
pub struct BackgroundScroller {
    tx: watch::Sender<Option<ScrollPosition>>,
    handle: JoinHandle<()>,
}

impl BackgroundScroller {
    /// Spawn the update task. Must be called inside a tokio runtime.
    pub fn start(surface: Arc<dyn LayerSurface>, frame: Duration) -> Self {
        let (tx, mut rx) = watch::channel(None::<ScrollPosition>);

        let handle = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                // Wait for the next frame; scrolls in the meantime replace this one
                tokio::time::sleep(frame).await;
                let latest = *rx.borrow_and_update();
                if let Some(pos) = latest {
                    let active =
                        active_layers(pos.scroll_y, pos.window_height, surface.layer_count());
                    trace!("Scroll {:?} -> {:?}", pos, active);
                    surface.apply(&active);
                }
            }
        });

        Self { tx, handle }
    }

    /// Record a scroll position; never blocks
    pub fn scroll(&self, position: ScrollPosition) {
        self.tx.send_replace(Some(position));
    }

    /// Stop applying updates; later scrolls are ignored
    pub fn stop(&self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recording {
        count: usize,
        applied: Mutex<Vec<Vec<bool>>>,
    }

    impl LayerSurface for Recording {
        fn layer_count(&self) -> usize {
            self.count
        }

        fn apply(&self, active: &[bool]) {
            self.applied.lock().push(active.to_vec());
        }
    }

    #[test]
    fn test_active_layers_at_page_top() {
        assert_eq!(active_layers(0.0, 800.0, 3), vec![true, false, false]);
    }

    #[test]
    fn test_active_layers_between_screens() {
        // progress 1.2: layer 1 active
        assert_eq!(active_layers(960.0, 800.0, 3), vec![false, true, false]);
        // progress exactly 0.5: neither neighbour is strictly closer than 0.5
        assert_eq!(active_layers(400.0, 800.0, 3), vec![false, false, false]);
        // past the last layer
        assert_eq!(active_layers(4000.0, 800.0, 3), vec![false, false, false]);
    }

    #[test]
    fn test_active_layers_degenerate_height() {
        assert_eq!(active_layers(100.0, 0.0, 2), vec![false, false]);
    }

    #[test]
    fn test_mirror_publishes_only_changes() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let layers = MirrorLayers::new(vec!["a.png".into(), "b.png".into()], Some(bus));

        layers.apply(&[true, false]);
        assert!(rx.try_recv().is_err());

        layers.apply(&[false, true]);
        match rx.try_recv().unwrap() {
            ReefEvent::BackgroundChanged { active, .. } => assert_eq!(active, vec![false, true]),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(layers.snapshot()[1].active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroller_coalesces_within_a_frame() {
        let surface = Arc::new(Recording {
            count: 3,
            applied: Mutex::new(Vec::new()),
        });
        let scroller = BackgroundScroller::start(surface.clone(), FRAME_INTERVAL);

        scroller.scroll(ScrollPosition { scroll_y: 100.0, window_height: 800.0 });
        scroller.scroll(ScrollPosition { scroll_y: 900.0, window_height: 800.0 });
        scroller.scroll(ScrollPosition { scroll_y: 1700.0, window_height: 800.0 });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(*surface.applied.lock(), vec![vec![false, false, true]]);

        scroller.scroll(ScrollPosition { scroll_y: 0.0, window_height: 800.0 });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(surface.applied.lock().len(), 2);
        assert_eq!(surface.applied.lock()[1], vec![true, false, false]);

        scroller.stop();
    }
}
