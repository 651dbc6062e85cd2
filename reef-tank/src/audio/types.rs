//! Core audio data types
//!
//! Defines the decoded asset buffer and the stereo frame passed between the
//! graph and the output driver.

/// AudioBuffer holds one fully decoded asset in RAM.
///
/// **Format:**
/// - Samples are f32 (floating point -1.0 to 1.0)
/// - Stereo interleaved: [L, R, L, R, ...]
/// - Sample rate is the asset's own; sources convert while rendering
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// PCM audio samples (interleaved stereo)
    pub samples: Vec<f32>,

    /// Source sample rate
    pub sample_rate: u32,

    /// Number of stereo frames (samples.len() / 2)
    pub frame_count: usize,
}

impl AudioBuffer {
    /// Create a buffer from interleaved stereo samples
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        let frame_count = samples.len() / 2;
        Self {
            samples,
            sample_rate,
            frame_count,
        }
    }

    /// Get duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    /// Get audio frame at specific frame index
    pub fn get_frame(&self, frame_index: usize) -> Option<AudioFrame> {
        if frame_index >= self.frame_count {
            return None;
        }
        let sample_index = frame_index * 2;
        Some(AudioFrame {
            left: self.samples[sample_index],
            right: self.samples[sample_index + 1],
        })
    }

    /// Linearly interpolated frame at a fractional position.
    ///
    /// With `looping`, the frame after the last one is the first one.
    pub fn frame_at(&self, position: f64, looping: bool) -> AudioFrame {
        if self.frame_count == 0 || position < 0.0 {
            return AudioFrame::zero();
        }

        let index = position.floor() as usize;
        let frac = (position - index as f64) as f32;

        let Some(current) = self.get_frame(index) else {
            return AudioFrame::zero();
        };
        let next_index = index + 1;
        let next = if next_index < self.frame_count {
            self.get_frame(next_index).unwrap_or(current)
        } else if looping {
            self.get_frame(0).unwrap_or(current)
        } else {
            current
        };

        AudioFrame {
            left: current.left + (next.left - current.left) * frac,
            right: current.right + (next.right - current.right) * frac,
        }
    }
}

/// AudioFrame represents a single stereo sample (one frame of audio).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFrame {
    /// Left channel sample
    pub left: f32,

    /// Right channel sample
    pub right: f32,
}

impl AudioFrame {
    /// Create a silent frame (0.0, 0.0)
    pub fn zero() -> Self {
        AudioFrame { left: 0.0, right: 0.0 }
    }

    /// Create a frame from left and right samples
    pub fn from_stereo(left: f32, right: f32) -> Self {
        AudioFrame { left, right }
    }

    /// Apply volume scaling to both channels
    pub fn apply_volume(&mut self, volume: f32) {
        self.left *= volume;
        self.right *= volume;
    }

    /// Add another frame to this frame (for mixing)
    pub fn add(&mut self, other: &AudioFrame) {
        self.left += other.left;
        self.right += other.right;
    }

    /// Clamp samples to valid range [-1.0, 1.0] to prevent clipping
    pub fn clamp(&mut self) {
        self.left = self.left.clamp(-1.0, 1.0);
        self.right = self.right.clamp(-1.0, 1.0);
    }

    /// Larger absolute value of the two channels
    pub fn peak(&self) -> f32 {
        self.left.abs().max(self.right.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_creation() {
        let buffer = AudioBuffer::new(vec![0.5, -0.5, 0.25, -0.25], 44100);
        assert_eq!(buffer.frame_count, 2);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = AudioBuffer::new(vec![0.0; 22050 * 2], 22050);
        assert!((buffer.duration_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_get_frame_bounds() {
        let buffer = AudioBuffer::new(vec![0.1, 0.2, 0.3, 0.4], 44100);
        assert_eq!(buffer.get_frame(1), Some(AudioFrame::from_stereo(0.3, 0.4)));
        assert!(buffer.get_frame(2).is_none());
    }

    #[test]
    fn test_frame_at_interpolates() {
        let buffer = AudioBuffer::new(vec![0.0, 0.0, 1.0, -1.0], 44100);
        let mid = buffer.frame_at(0.5, false);
        assert!((mid.left - 0.5).abs() < 1e-6);
        assert!((mid.right + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_frame_at_wraps_when_looping() {
        let buffer = AudioBuffer::new(vec![0.0, 0.0, 1.0, 1.0], 44100);
        // Halfway between the last frame and the first one
        let wrapped = buffer.frame_at(1.5, true);
        assert!((wrapped.left - 0.5).abs() < 1e-6);
        let held = buffer.frame_at(1.5, false);
        assert!((held.left - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_audio_frame_mixing() {
        let mut frame = AudioFrame::from_stereo(0.3, 0.4);
        frame.add(&AudioFrame::from_stereo(0.9, -0.1));
        frame.apply_volume(0.5);
        assert!((frame.left - 0.6).abs() < 1e-6);
        assert!((frame.right - 0.15).abs() < 1e-6);

        let mut loud = AudioFrame::from_stereo(1.5, -1.5);
        loud.clamp();
        assert_eq!(loud, AudioFrame::from_stereo(1.0, -1.0));
        assert_eq!(loud.peak(), 1.0);
    }
}
