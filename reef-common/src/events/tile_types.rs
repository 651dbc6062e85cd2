//! Tile-related type definitions
//!
//! Supporting types for audio tile lifecycle and UI mirrors.

use serde::{Deserialize, Serialize};

/// Load progress of an audio tile's asset
///
/// Ordinal and strictly increasing; only a full teardown moves it back to
/// `Unloaded`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Unloaded = 0,
    FetchStarted = 1,
    FetchComplete = 2,
    SourceNodeCreated = 3,
    GainNodeCreated = 4,
    Ready = 5,
}

impl LoadState {
    /// Numeric stage, 0 through 5
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn is_ready(self) -> bool {
        self == LoadState::Ready
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadState::Unloaded => write!(f, "Unloaded"),
            LoadState::FetchStarted => write!(f, "FetchStarted"),
            LoadState::FetchComplete => write!(f, "FetchComplete"),
            LoadState::SourceNodeCreated => write!(f, "SourceNodeCreated"),
            LoadState::GainNodeCreated => write!(f, "GainNodeCreated"),
            LoadState::Ready => write!(f, "Ready"),
        }
    }
}

/// Background colour a tile shows for its lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileColor {
    Loading,
    Error,
    Playing,
    Stopped,
}

impl TileColor {
    /// CSS colour for the background slot
    pub fn css(self) -> &'static str {
        match self {
            TileColor::Loading => "#8800cc",
            TileColor::Error => "#ff0000",
            TileColor::Playing => "#999999",
            TileColor::Stopped => "#555555",
        }
    }
}

/// Point-in-time view of one bound tile element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub id: String,
    pub label: Option<String>,
    /// CSS background colour, `None` until the tile is first used
    pub background: Option<String>,
    pub button_enabled: bool,
    pub slider_enabled: bool,
    /// 0-100; shows load progress while fetching, volume otherwise
    pub slider_value: f64,
}

/// Point-in-time view of an audio node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileStatus {
    pub src: String,
    pub load_state: LoadState,
    pub playing: bool,
    pub error: bool,
    pub volume: f32,
    /// Number of bound elements
    pub pointers: usize,
}
