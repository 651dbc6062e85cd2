//! UI surfaces bound to an audio node
//!
//! A tile element is one clickable tile on the page: a background colour, a
//! play/stop button and a volume slider. [`MirrorElement`] keeps that state in
//! memory and publishes every change on the event bus so a front end can
//! render it.

use parking_lot::Mutex;
use reef_common::events::{ElementSnapshot, EventBus, ReefEvent, TileColor};
use tracing::trace;

/// Capability an audio node uses to reflect its state
pub trait TileElement: Send + Sync {
    /// Unique element id
    fn id(&self) -> &str;

    /// Background colour; `None` clears it
    fn set_color(&self, color: Option<TileColor>);

    fn set_button_enabled(&self, enabled: bool);

    fn set_slider_enabled(&self, enabled: bool);

    /// Current slider position (0-100)
    fn slider_value(&self) -> f64;

    fn set_slider_value(&self, value: f64);

    fn button_enabled(&self) -> bool;

    fn slider_enabled(&self) -> bool;

    fn snapshot(&self) -> ElementSnapshot;
}

#[derive(Debug, Clone)]
struct MirrorState {
    color: Option<TileColor>,
    button_enabled: bool,
    slider_enabled: bool,
    slider_value: f64,
}

/// In-memory tile element
pub struct MirrorElement {
    id: String,
    label: Option<String>,
    state: Mutex<MirrorState>,
    events: Option<EventBus>,
}

impl MirrorElement {
    /// New element with controls enabled and the slider at `slider_value`
    pub fn new(id: impl Into<String>, label: Option<String>, slider_value: f64) -> Self {
        Self {
            id: id.into(),
            label,
            state: Mutex::new(MirrorState {
                color: None,
                button_enabled: true,
                slider_enabled: true,
                slider_value,
            }),
            events: None,
        }
    }

    /// Publish every change on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn color(&self) -> Option<TileColor> {
        self.state.lock().color
    }

    fn update(&self, apply: impl FnOnce(&mut MirrorState) -> bool) {
        let changed = {
            let mut state = self.state.lock();
            apply(&mut state)
        };
        if !changed {
            return;
        }
        trace!("Element {} changed", self.id);
        if let Some(events) = &self.events {
            events.emit_lossy(ReefEvent::TileElementChanged {
                element: self.snapshot(),
                timestamp: chrono::Utc::now(),
            });
        }
    }
}

impl TileElement for MirrorElement {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_color(&self, color: Option<TileColor>) {
        self.update(|s| std::mem::replace(&mut s.color, color) != color);
    }

    fn set_button_enabled(&self, enabled: bool) {
        self.update(|s| std::mem::replace(&mut s.button_enabled, enabled) != enabled);
    }

    fn set_slider_enabled(&self, enabled: bool) {
        self.update(|s| std::mem::replace(&mut s.slider_enabled, enabled) != enabled);
    }

    fn slider_value(&self) -> f64 {
        self.state.lock().slider_value
    }

    fn set_slider_value(&self, value: f64) {
        let value = value.clamp(0.0, 100.0);
        self.update(|s| std::mem::replace(&mut s.slider_value, value) != value);
    }

    fn button_enabled(&self) -> bool {
        self.state.lock().button_enabled
    }

    fn slider_enabled(&self) -> bool {
        self.state.lock().slider_enabled
    }

    fn snapshot(&self) -> ElementSnapshot {
        let state = self.state.lock();
        ElementSnapshot {
            id: self.id.clone(),
            label: self.label.clone(),
            background: state.color.map(|c| c.css().to_string()),
            button_enabled: state.button_enabled,
            slider_enabled: state.slider_enabled,
            slider_value: state.slider_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_state() {
        let element = MirrorElement::new("kelp", Some("Kelp".to_string()), 63.0);
        element.set_color(Some(TileColor::Playing));
        element.set_slider_enabled(false);

        let snap = element.snapshot();
        assert_eq!(snap.id, "kelp");
        assert_eq!(snap.background.as_deref(), Some("#999999"));
        assert!(snap.button_enabled);
        assert!(!snap.slider_enabled);
        assert_eq!(snap.slider_value, 63.0);
    }

    #[test]
    fn test_slider_value_is_clamped() {
        let element = MirrorElement::new("a", None, 0.0);
        element.set_slider_value(140.0);
        assert_eq!(element.slider_value(), 100.0);
        element.set_slider_value(-3.0);
        assert_eq!(element.slider_value(), 0.0);
    }

    #[tokio::test]
    async fn test_changes_are_published_once() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let element = MirrorElement::new("a", None, 50.0).with_events(bus);

        element.set_color(Some(TileColor::Loading));
        // Same colour again is not a change
        element.set_color(Some(TileColor::Loading));
        element.set_button_enabled(false);

        match rx.recv().await.unwrap() {
            ReefEvent::TileElementChanged { element, .. } => {
                assert_eq!(element.background.as_deref(), Some("#8800cc"));
                assert!(element.button_enabled);
            }
            other => panic!("unexpected event {:?}", other),
        }
        match rx.recv().await.unwrap() {
            ReefEvent::TileElementChanged { element, .. } => assert!(!element.button_enabled),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }
}
