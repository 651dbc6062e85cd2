//! # Reef Tank Library (reef-tank)
//!
//! Headless host for the Reef aquarium scene.
//!
//! **Purpose:** Own the looping ambient audio tiles (fetch, decode, fade in
//! and out), model the swimming fish and scroll-driven background, and expose
//! all of it as in-memory UI mirrors over HTTP/SSE.
//!
//! **Architecture:** symphonia decoding into a small software audio graph,
//! rendered by a null driver or cpal; axum for the control surface.

pub mod api;
pub mod audio;
pub mod error;
pub mod scene;
pub mod state;
pub mod tile;
pub mod transport;

pub use error::{Error, Result};
pub use state::SharedState;
