//! Decorative scene: swimming fish and the scroll-driven background

pub mod background;
pub mod fish;

pub use background::{
    active_layers, BackgroundScroller, LayerSurface, LayerView, MirrorLayers, ScrollPosition,
};
pub use fish::{Fish, FishFrame, School, SwimDirection, Viewport};
