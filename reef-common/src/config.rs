//! Scene configuration loading and resolution
//!
//! A scene file is TOML. Every section is optional; missing sections fall back
//! to compiled defaults so the host can start with no file at all.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:5780"
//!
//! [audio]
//! output = "null"
//! asset_base = "http://127.0.0.1:8000/audio/"
//!
//! [[tiles]]
//! id = "rain"
//! src = "rain.ogg"
//! label = "Rain"
//!
//! [[fish]]
//! sprite = "img/clownfish.png"
//! depth = 35.0
//! speed = 1.5
//! direction = "random"
//!
//! [background]
//! layers = ["img/surface.png", "img/reef.png", "img/abyss.png"]
//! ```

use crate::volume::settle_time;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the scene file
pub const CONFIG_ENV_VAR: &str = "REEF_CONFIG";

/// Default volume for tiles that don't specify one
pub const DEFAULT_TILE_VOLUME: f32 = 0.25;

/// Complete scene description
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SceneConfig {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub tiles: Vec<TileConfig>,
    pub fish: Vec<FishConfig>,
    pub background: BackgroundConfig,
}

/// HTTP host settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the API binds to
    pub bind: String,
    /// Broadcast buffer for the SSE event bus
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5780".to_string(),
            event_capacity: 256,
        }
    }
}

/// Which driver pulls frames out of the shared destination
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputDriver {
    /// Render on a timer and discard (headless hosts, CI)
    #[default]
    Null,
    /// Render to the default sound device
    Device,
}

/// Audio graph and tile timing settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub output: OutputDriver,
    /// Output sample rate used by the null driver
    pub sample_rate: u32,
    /// Base that relative tile sources resolve against.
    /// `http(s)://` bases use the HTTP transport, anything else is a local directory.
    pub asset_base: String,
    /// Exponential-approach time constant for fades, in seconds
    pub fade_time_constant_secs: f64,
    /// Delay between starting a fade-out and disconnecting the output
    pub fade_window_ms: u64,
    /// User events older than this are dropped by toggle
    pub stale_event_ms: u64,
    /// Volume for tiles that don't set one
    pub default_volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output: OutputDriver::Null,
            sample_rate: 44100,
            asset_base: "http://127.0.0.1:8000/".to_string(),
            fade_time_constant_secs: crate::volume::DEFAULT_TIME_CONSTANT_SECS,
            fade_window_ms: 1000,
            stale_event_ms: 500,
            default_volume: DEFAULT_TILE_VOLUME,
        }
    }
}

impl AudioConfig {
    /// True when `asset_base` points at an HTTP server
    pub fn is_remote(&self) -> bool {
        self.asset_base.starts_with("http://") || self.asset_base.starts_with("https://")
    }

    /// Whether a fade-out has reached 95% of silence by the time the
    /// fade window closes and the output is disconnected
    pub fn fade_window_covers_fade(&self) -> bool {
        let needed_ms = settle_time(self.fade_time_constant_secs, 0.95) * 1000.0;
        self.fade_window_ms as f64 >= needed_ms
    }
}

/// One clickable audio tile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TileConfig {
    /// Unique element id
    pub id: String,
    /// Audio asset; tiles sharing a source share one loaded asset
    pub src: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub volume: Option<f32>,
}

/// Swim direction as written in the scene file
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DirectionSetting {
    Left,
    #[default]
    Right,
    /// Coin flip at spawn time
    Random,
}

/// One fish sprite placeholder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FishConfig {
    pub sprite: String,
    /// Vertical position in viewport-height units
    pub depth: f64,
    #[serde(default = "default_fish_speed")]
    pub speed: f64,
    #[serde(default)]
    pub direction: DirectionSetting,
}

fn default_fish_speed() -> f64 {
    1.0
}

/// Parallax background layers, top of the page first
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackgroundConfig {
    pub layers: Vec<String>,
}

impl SceneConfig {
    /// Parse and validate a scene from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SceneConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a scene file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading scene file {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject scenes the host cannot run
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for tile in &self.tiles {
            if tile.id.trim().is_empty() {
                return Err(Error::Config("tile id must not be empty".to_string()));
            }
            if tile.src.trim().is_empty() {
                return Err(Error::Config(format!("tile '{}' has an empty src", tile.id)));
            }
            if !seen.insert(tile.id.as_str()) {
                return Err(Error::Config(format!("duplicate tile id '{}'", tile.id)));
            }
            if let Some(volume) = tile.volume {
                if !(0.0..=1.0).contains(&volume) {
                    return Err(Error::Config(format!(
                        "tile '{}' volume {} is outside 0.0-1.0",
                        tile.id, volume
                    )));
                }
            }
        }

        if !(0.0..=1.0).contains(&self.audio.default_volume) {
            return Err(Error::Config(format!(
                "default_volume {} is outside 0.0-1.0",
                self.audio.default_volume
            )));
        }
        if self.audio.fade_time_constant_secs <= 0.0 {
            return Err(Error::Config(
                "fade_time_constant_secs must be positive".to_string(),
            ));
        }
        if self.audio.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be positive".to_string()));
        }
        if !self.audio.fade_window_covers_fade() {
            warn!(
                "fade_window_ms {} is shorter than the fade; stopped tiles will click",
                self.audio.fade_window_ms
            );
        }

        for fish in &self.fish {
            if fish.speed <= 0.0 {
                return Err(Error::Config(format!(
                    "fish '{}' speed must be positive",
                    fish.sprite
                )));
            }
        }

        Ok(())
    }

    /// Volume a tile starts with
    pub fn tile_volume(&self, tile: &TileConfig) -> f32 {
        tile.volume.unwrap_or(self.audio.default_volume)
    }
}

/// Scene file resolution, in priority order:
/// 1. Command-line argument
/// 2. `REEF_CONFIG` environment variable
/// 3. `<config dir>/reef/scene.toml` if it exists
/// 4. None (compiled defaults)
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Path of the scene file to load, if any
    pub fn resolve(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        let user_config = dirs::config_dir().map(|d| d.join("reef").join("scene.toml"));
        user_config.filter(|path| path.exists())
    }

    /// Load the resolved scene, falling back to defaults when none is found.
    ///
    /// An explicitly named file that fails to load is an error; a missing
    /// default location is not.
    pub fn load(&self) -> Result<SceneConfig> {
        match self.resolve() {
            Some(path) => {
                let config = SceneConfig::load(&path)?;
                info!(
                    "Loaded scene {} ({} tiles, {} fish, {} layers)",
                    path.display(),
                    config.tiles.len(),
                    config.fish.len(),
                    config.background.layers.len()
                );
                Ok(config)
            }
            None => {
                warn!("No scene file found, starting with an empty default scene");
                Ok(SceneConfig::default())
            }
        }
    }
}
