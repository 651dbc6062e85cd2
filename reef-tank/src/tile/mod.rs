//! Audio tiles
//!
//! - `element`: UI surfaces a node reflects its state into
//! - `node`: the per-asset load/play/stop lifecycle
//! - `board`: registry mapping tiles to shared nodes

pub mod board;
pub mod element;
pub mod node;

pub use board::{TileBoard, TileView};
pub use element::{MirrorElement, TileElement};
pub use node::{AudioNode, NodeContext, NodeSettings};
