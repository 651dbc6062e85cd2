//! Volume scaling and fade math
//!
//! Tiles fade with an exponential approach rather than a fixed-length curve:
//! a gain stage moving toward a target covers `1 - e^(-t/tau)` of the
//! distance after `t` seconds. With the default time constant of 0.183 s the
//! audible part of a fade is over in roughly half a second (95% after three
//! time constants).
//!
//! Sliders show volume on a cube-root scale so equal slider steps sound like
//! roughly equal loudness steps.

/// Default fade time constant in seconds
pub const DEFAULT_TIME_CONSTANT_SECS: f64 = 0.183;

/// Slider position (0-100) for a linear gain (0.0-1.0)
pub fn slider_from_gain(gain: f32) -> f64 {
    (gain.clamp(0.0, 1.0) as f64).cbrt() * 100.0
}

/// Linear gain (0.0-1.0) for a slider position (0-100)
pub fn gain_from_slider(value: f64) -> f32 {
    let t = (value / 100.0).clamp(0.0, 1.0);
    (t * t * t) as f32
}

/// Value of an exponential approach from `from` toward `to` after `elapsed` seconds
pub fn approach(from: f64, to: f64, elapsed: f64, time_constant: f64) -> f64 {
    if elapsed <= 0.0 {
        return from;
    }
    if time_constant <= 0.0 {
        return to;
    }
    to + (from - to) * (-elapsed / time_constant).exp()
}

/// Seconds until an exponential approach has covered `fraction` of the distance
pub fn settle_time(time_constant: f64, fraction: f64) -> f64 {
    let fraction = fraction.clamp(0.0, 0.999_999);
    -time_constant * (1.0 - fraction).ln()
}
