//! Audio subsystem
//!
//! Decoding, the gain automation timeline, the node graph, and output drivers.

pub mod decoder;
pub mod graph;
pub mod output;
pub mod param;
pub mod types;

pub use decoder::SimpleDecoder;
pub use graph::{AudioContext, BufferSourceNode, Destination, GainNode};
pub use output::{NullOutput, Output};
pub use param::GainParam;
pub use types::{AudioBuffer, AudioFrame};
