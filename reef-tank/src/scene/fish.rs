//! Swimming fish sprites
//!
//! Each fish is spawned once with a little randomness (speed jitter, phase
//! offset, and optionally direction) and afterwards its horizontal position
//! is a pure function of wall-clock time.

use rand::Rng;
use reef_common::config::{DirectionSetting, FishConfig};
use serde::{Deserialize, Serialize};

/// Viewport size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Smaller of the two dimensions
    pub fn vmin(&self) -> f64 {
        self.width.min(self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwimDirection {
    Left,
    Right,
}

/// One spawned fish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fish {
    pub sprite: String,
    /// Vertical position in vh, two decimals
    pub depth: f64,
    /// Screen widths per ~second, jittered around the configured speed
    pub swim_speed: f64,
    /// Phase offset in milliseconds
    pub swim_offset: f64,
    pub direction: SwimDirection,
    /// Sprite scale, `vmin / 360`
    pub scale: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl Fish {
    /// Spawn a fish from its configuration at wall-clock `now_ms`
    pub fn spawn<R: Rng + ?Sized>(
        config: &FishConfig,
        viewport: Viewport,
        now_ms: f64,
        rng: &mut R,
    ) -> Self {
        // Up to 50% faster or slower than asked for
        let jitter: f64 = rng.gen::<f64>() - 0.5;
        let swim_speed = round2(config.speed + jitter * config.speed);
        let swim_offset = round2(rng.gen::<f64>() * now_ms);

        let direction = match config.direction {
            DirectionSetting::Left => SwimDirection::Left,
            DirectionSetting::Right => SwimDirection::Right,
            DirectionSetting::Random => {
                if rng.gen_bool(0.5) {
                    SwimDirection::Left
                } else {
                    SwimDirection::Right
                }
            }
        };

        Self {
            sprite: config.sprite.clone(),
            depth: round2(config.depth),
            swim_speed,
            swim_offset,
            direction,
            scale: viewport.vmin() / 360.0,
        }
    }

    /// Horizontal offset in pixels at `now_ms` for a viewport `width` wide.
    ///
    /// Fish wrap around a track 1.4 widths long that starts 0.2 widths
    /// off-screen; left swimmers run the track mirrored.
    pub fn offset_px(&self, now_ms: f64, width: f64) -> f64 {
        if width <= 0.0 || self.swim_speed <= 0.0 {
            return 0.0;
        }
        let period_ms = 1000.0 / self.swim_speed;
        let offset = ((now_ms + self.swim_offset) / period_ms) % (width * 1.4) - width * 0.2;
        match self.direction {
            SwimDirection::Right => offset,
            SwimDirection::Left => width - offset,
        }
    }

    /// CSS transform: mirrored for left swimmers, then scaled
    pub fn transform(&self) -> String {
        let flip = match self.direction {
            SwimDirection::Left => "scaleX(-1)",
            SwimDirection::Right => "",
        };
        format!("{} scale({}, {})", flip, self.scale, self.scale)
    }

    pub fn margin_top(&self) -> String {
        format!("{:.2}vh", self.depth)
    }

    /// Rescale after a viewport change
    pub fn resize(&mut self, viewport: Viewport) {
        self.scale = viewport.vmin() / 360.0;
    }
}

/// Where a fish is drawn in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FishFrame {
    pub sprite: String,
    pub margin_top: String,
    pub margin_left_px: f64,
    pub transform: String,
}

/// Every fish in the scene
#[derive(Debug, Clone, Default, Serialize)]
pub struct School {
    fish: Vec<Fish>,
}

impl School {
    pub fn spawn<R: Rng + ?Sized>(
        configs: &[FishConfig],
        viewport: Viewport,
        now_ms: f64,
        rng: &mut R,
    ) -> Self {
        Self {
            fish: configs
                .iter()
                .map(|c| Fish::spawn(c, viewport, now_ms, &mut *rng))
                .collect(),
        }
    }

    pub fn fish(&self) -> &[Fish] {
        &self.fish
    }

    pub fn len(&self) -> usize {
        self.fish.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fish.is_empty()
    }

    pub fn resize(&mut self, viewport: Viewport) {
        for fish in &mut self.fish {
            fish.resize(viewport);
        }
    }

    /// Position of every fish at `now_ms`
    pub fn frame(&self, now_ms: f64, width: f64) -> Vec<FishFrame> {
        self.fish
            .iter()
            .map(|fish| FishFrame {
                sprite: fish.sprite.clone(),
                margin_top: fish.margin_top(),
                margin_left_px: fish.offset_px(now_ms, width),
                transform: fish.transform(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config(speed: f64, direction: DirectionSetting) -> FishConfig {
        FishConfig {
            sprite: "img/clownfish.png".to_string(),
            depth: 12.3456,
            speed,
            direction,
        }
    }

    fn fish(direction: SwimDirection) -> Fish {
        Fish {
            sprite: "img/tang.png".to_string(),
            depth: 10.0,
            swim_speed: 2.0,
            swim_offset: 500.0,
            direction,
            scale: 1.0,
        }
    }

    #[test]
    fn test_spawn_jitter_stays_within_half() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let f = Fish::spawn(
                &config(2.0, DirectionSetting::Right),
                Viewport::new(1280.0, 720.0),
                1_700_000_000_000.0,
                &mut rng,
            );
            assert!(f.swim_speed >= 1.0 && f.swim_speed <= 3.0, "{}", f.swim_speed);
            assert_eq!(f.swim_speed, round2(f.swim_speed));
            assert!(f.swim_offset >= 0.0 && f.swim_offset <= 1_700_000_000_000.0);
            assert_eq!(f.direction, SwimDirection::Right);
        }
    }

    #[test]
    fn test_spawn_depth_and_scale() {
        let mut rng = StdRng::seed_from_u64(1);
        let f = Fish::spawn(
            &config(1.0, DirectionSetting::Left),
            Viewport::new(1080.0, 720.0),
            0.0,
            &mut rng,
        );
        assert_eq!(f.depth, 12.35);
        assert_eq!(f.margin_top(), "12.35vh");
        assert_eq!(f.scale, 2.0);
        assert_eq!(f.swim_offset, 0.0);
        assert_eq!(f.direction, SwimDirection::Left);
    }

    #[test]
    fn test_random_direction_picks_both() {
        let mut rng = StdRng::seed_from_u64(42);
        let directions: Vec<SwimDirection> = (0..64)
            .map(|_| {
                Fish::spawn(
                    &config(1.0, DirectionSetting::Random),
                    Viewport::new(800.0, 600.0),
                    1000.0,
                    &mut rng,
                )
                .direction
            })
            .collect();
        assert!(directions.contains(&SwimDirection::Left));
        assert!(directions.contains(&SwimDirection::Right));
    }

    #[test]
    fn test_offset_formula() {
        let right = fish(SwimDirection::Right);
        // (1500 + 500) / 500 = 4, 4 % 1400 = 4, minus 200
        assert!((right.offset_px(1500.0, 1000.0) - (-196.0)).abs() < 1e-9);

        let left = fish(SwimDirection::Left);
        assert!((left.offset_px(1500.0, 1000.0) - 1196.0).abs() < 1e-9);
    }

    #[test]
    fn test_offset_wraps_around_track() {
        let f = fish(SwimDirection::Right);
        // Track is 1400 px; 1400 px of travel takes 700 s at speed 2
        let a = f.offset_px(10_000.0, 1000.0);
        let b = f.offset_px(10_000.0 + 700_000.0, 1000.0);
        assert!((a - b).abs() < 1e-6);
        for t in (0..2_000_000).step_by(99_991) {
            let x = f.offset_px(t as f64, 1000.0);
            assert!((-200.0..1200.0).contains(&x));
        }
    }

    #[test]
    fn test_offset_zero_width() {
        assert_eq!(fish(SwimDirection::Right).offset_px(1000.0, 0.0), 0.0);
    }

    #[test]
    fn test_transform_strings() {
        let mut f = fish(SwimDirection::Left);
        f.scale = 1.5;
        assert_eq!(f.transform(), "scaleX(-1) scale(1.5, 1.5)");
        f.direction = SwimDirection::Right;
        assert_eq!(f.transform(), " scale(1.5, 1.5)");
    }

    #[test]
    fn test_school_frame_has_one_entry_per_fish() {
        let mut rng = StdRng::seed_from_u64(3);
        let configs = vec![
            config(1.0, DirectionSetting::Left),
            config(1.0, DirectionSetting::Right),
        ];
        let mut school = School::spawn(&configs, Viewport::new(720.0, 720.0), 5000.0, &mut rng);
        let frame = school.frame(6000.0, 720.0);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame[0].transform, "scaleX(-1) scale(2, 2)");

        school.resize(Viewport::new(360.0, 900.0));
        assert_eq!(school.fish()[1].scale, 1.0);
    }
}
