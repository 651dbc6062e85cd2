//! Tests for scene file resolution and loading
//!
//! Tests that touch REEF_CONFIG are marked #[serial] so they don't race on
//! the process environment.

use reef_common::config::{
    ConfigResolver, DirectionSetting, OutputDriver, SceneConfig, CONFIG_ENV_VAR,
};
use reef_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

const SCENE: &str = r#"
[server]
bind = "0.0.0.0:6000"

[audio]
output = "null"
asset_base = "/srv/reef/audio"
fade_window_ms = 750

[[tiles]]
id = "rain-1"
src = "rain.ogg"
label = "Rain"

[[tiles]]
id = "rain-2"
src = "rain.ogg"
volume = 0.5

[[fish]]
sprite = "img/clownfish.png"
depth = 35.5
speed = 2.0
direction = "random"

[[fish]]
sprite = "img/tang.png"
depth = 60.0

[background]
layers = ["surface.png", "reef.png", "abyss.png"]
"#;

fn write_scene(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("write scene");
    path
}

#[test]
fn test_full_scene_parses() {
    let config = SceneConfig::from_toml_str(SCENE).unwrap();

    assert_eq!(config.server.bind, "0.0.0.0:6000");
    assert_eq!(config.server.event_capacity, 256);
    assert_eq!(config.audio.output, OutputDriver::Null);
    assert_eq!(config.audio.fade_window_ms, 750);
    assert_eq!(config.audio.stale_event_ms, 500);
    assert!(!config.audio.is_remote());

    assert_eq!(config.tiles.len(), 2);
    assert_eq!(config.tiles[0].label.as_deref(), Some("Rain"));
    assert_eq!(config.tile_volume(&config.tiles[1]), 0.5);

    assert_eq!(config.fish[0].direction, DirectionSetting::Random);
    assert_eq!(config.fish[1].direction, DirectionSetting::Right);
    assert_eq!(config.fish[1].speed, 1.0);

    assert_eq!(config.background.layers.len(), 3);
}

#[test]
fn test_unknown_output_driver_is_parse_error() {
    let result = SceneConfig::from_toml_str("[audio]\noutput = \"speakers\"\n");
    assert!(matches!(result, Err(Error::Parse(_))));
}

#[test]
fn test_non_positive_fish_speed_rejected() {
    let result = SceneConfig::from_toml_str(
        "[[fish]]\nsprite = \"a.png\"\ndepth = 10.0\nspeed = 0.0\n",
    );
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_cli_path_wins_over_env() {
    let dir = TempDir::new().unwrap();
    let cli = write_scene(&dir, "cli.toml", SCENE);
    let env_path = write_scene(&dir, "env.toml", "");
    env::set_var(CONFIG_ENV_VAR, &env_path);

    let resolver = ConfigResolver::new(Some(cli.clone()));
    assert_eq!(resolver.resolve(), Some(cli));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli() {
    let dir = TempDir::new().unwrap();
    let env_path = write_scene(&dir, "env.toml", SCENE);
    env::set_var(CONFIG_ENV_VAR, &env_path);

    let resolver = ConfigResolver::new(None);
    assert_eq!(resolver.resolve(), Some(env_path));

    let config = resolver.load().unwrap();
    assert_eq!(config.tiles.len(), 2);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let resolver = ConfigResolver::new(Some(dir.path().join("absent.toml")));

    assert!(matches!(resolver.load(), Err(Error::Io(_))));
}
