//! # Reef Common Library
//!
//! Shared code for the Reef aquarium host:
//! - Scene configuration loading
//! - Event types (ReefEvent enum) and the broadcast EventBus
//! - Perceptual volume mapping and exponential-approach math
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod events;
pub mod time;
pub mod volume;

pub use error::{Error, Result};
