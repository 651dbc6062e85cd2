//! Software audio graph
//!
//! A small graph: looping buffer sources feed gain stages, and
//! gain stages connect to the one shared [`Destination`] owned by the
//! [`AudioContext`]. The output driver pulls mixed frames out of the
//! destination; nothing here runs on its own.
//!
//! ```text
//! BufferSourceNode ──▶ GainNode ──▶ Destination ──▶ output driver
//! BufferSourceNode ──▶ GainNode ──┘
//! ```

use crate::audio::decoder::SimpleDecoder;
use crate::audio::param::GainParam;
use crate::audio::types::{AudioBuffer, AudioFrame};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::time::Instant;
use tracing::debug;

/// Shared audio capability: clock, decoding, node factories, and the output destination.
pub struct AudioContext {
    origin: Instant,
    sample_rate: u32,
    destination: Arc<Destination>,
}

impl AudioContext {
    /// Create a context whose destination renders at `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        Self {
            origin: Instant::now(),
            sample_rate,
            destination: Arc::new(Destination::new()),
        }
    }

    /// Seconds since the context was created (monotonic)
    pub fn current_time(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Shared output every gain stage connects to
    pub fn destination(&self) -> &Arc<Destination> {
        &self.destination
    }

    /// Decode an asset on the blocking pool
    pub async fn decode_audio_data(
        &self,
        bytes: Vec<u8>,
        extension: Option<String>,
    ) -> Result<Arc<AudioBuffer>> {
        let buffer = tokio::task::spawn_blocking(move || {
            SimpleDecoder::decode_bytes(bytes, extension.as_deref())
        })
        .await
        .map_err(|e| Error::Decode(format!("Decode task failed: {}", e)))??;
        Ok(Arc::new(buffer))
    }

    pub fn create_buffer_source(&self, buffer: Arc<AudioBuffer>) -> BufferSourceNode {
        BufferSourceNode {
            shared: Arc::new(SourceShared {
                buffer,
                state: Mutex::new(SourceState::default()),
            }),
        }
    }

    /// New gain stage (unity gain, unconnected)
    pub fn create_gain(&self) -> GainNode {
        GainNode {
            shared: Arc::new(GainShared {
                param: Mutex::new(GainParam::default()),
                inputs: Mutex::new(Vec::new()),
            }),
            destination: Arc::clone(&self.destination),
        }
    }
}

// ============================================================================
// Buffer source
// ============================================================================

#[derive(Debug, Default)]
struct SourceState {
    looping: bool,
    started: bool,
    stopped: bool,
    /// Read position in source frames
    position: f64,
    output: Option<Weak<GainShared>>,
}

struct SourceShared {
    buffer: Arc<AudioBuffer>,
    state: Mutex<SourceState>,
}

impl SourceShared {
    /// Pull `frames` output frames at `output_rate`, advancing the read position
    fn pull(&self, frames: usize, output_rate: u32, out: &mut Vec<AudioFrame>) {
        out.clear();
        let mut state = self.state.lock();

        if !state.started || state.stopped || self.buffer.is_empty() || output_rate == 0 {
            out.resize(frames, AudioFrame::zero());
            return;
        }

        let step = self.buffer.sample_rate as f64 / output_rate as f64;
        let length = self.buffer.frame_count as f64;

        for _ in 0..frames {
            if state.stopped {
                out.push(AudioFrame::zero());
                continue;
            }
            out.push(self.buffer.frame_at(state.position, state.looping));
            state.position += step;
            if state.position >= length {
                if state.looping {
                    state.position %= length;
                } else {
                    state.stopped = true;
                }
            }
        }
    }
}

/// Plays one decoded buffer, optionally looping
pub struct BufferSourceNode {
    shared: Arc<SourceShared>,
}

impl BufferSourceNode {
    pub fn set_loop(&self, looping: bool) {
        self.shared.state.lock().looping = looping;
    }

    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        &self.shared.buffer
    }

    /// Feed this source into a gain stage, replacing any previous connection
    pub fn connect(&self, gain: &GainNode) -> Result<()> {
        let mut state = self.shared.state.lock();
        if let Some(previous) = state.output.take().and_then(|w| w.upgrade()) {
            previous.remove_input(&self.shared);
        }
        gain.shared.inputs.lock().push(Arc::clone(&self.shared));
        state.output = Some(Arc::downgrade(&gain.shared));
        Ok(())
    }

    /// Detach from the gain stage this source feeds
    pub fn disconnect(&self) -> Result<()> {
        let output = self.shared.state.lock().output.take();
        match output.and_then(|w| w.upgrade()) {
            Some(gain) => {
                gain.remove_input(&self.shared);
                Ok(())
            }
            None => Err(Error::Graph("source is not connected".to_string())),
        }
    }

    /// Begin emitting samples. A source can only be started once.
    pub fn start(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.started {
            return Err(Error::Graph("source already started".to_string()));
        }
        state.started = true;
        Ok(())
    }

    /// Stop emitting samples for good
    pub fn stop(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if !state.started {
            return Err(Error::Graph("source stopped before it was started".to_string()));
        }
        state.stopped = true;
        Ok(())
    }

    /// Started and not yet stopped or run off the end
    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        let state = self.shared.state.lock();
        state.started && !state.stopped
    }
}

// ============================================================================
// Gain stage
// ============================================================================

struct GainShared {
    param: Mutex<GainParam>,
    inputs: Mutex<Vec<Arc<SourceShared>>>,
}

impl GainShared {
    fn remove_input(&self, source: &Arc<SourceShared>) {
        self.inputs.lock().retain(|s| !Arc::ptr_eq(s, source));
    }

    /// Mix inputs and apply the automated gain for `frames` frames starting at `start_time`
    fn render_into(
        &self,
        acc: &mut [AudioFrame],
        start_time: f64,
        sample_rate: u32,
        scratch: &mut Vec<AudioFrame>,
    ) {
        let inputs: Vec<Arc<SourceShared>> = self.inputs.lock().clone();
        if inputs.is_empty() {
            return;
        }

        let frames = acc.len();
        let mut mixed = vec![AudioFrame::zero(); frames];
        for source in &inputs {
            source.pull(frames, sample_rate, scratch);
            for (m, s) in mixed.iter_mut().zip(scratch.iter()) {
                m.add(s);
            }
        }

        let param = self.param.lock();
        let dt = 1.0 / sample_rate as f64;
        for (i, (a, m)) in acc.iter_mut().zip(mixed.iter_mut()).enumerate() {
            m.apply_volume(param.value_at(start_time + i as f64 * dt));
            a.add(m);
        }
    }
}

/// Volume stage with an automation timeline
pub struct GainNode {
    shared: Arc<GainShared>,
    destination: Arc<Destination>,
}

impl GainNode {
    /// Jump the gain to `value` at context time `time`
    pub fn set_value_at_time(&self, value: f32, time: f64) {
        self.shared.param.lock().set_value_at_time(value, time);
    }

    /// Approach `target` from context time `time` with the given time constant
    pub fn set_target_at_time(&self, target: f32, time: f64, time_constant: f64) {
        self.shared
            .param
            .lock()
            .set_target_at_time(target, time, time_constant);
    }

    /// Gain in force at context time `time`
    pub fn value_at(&self, time: f64) -> f32 {
        self.shared.param.lock().value_at(time)
    }

    /// Route this stage into the shared destination. Connecting twice is a no-op.
    pub fn connect_destination(&self) -> Result<()> {
        self.destination.attach(&self.shared);
        Ok(())
    }

    /// Remove this stage from the destination
    pub fn disconnect(&self) -> Result<()> {
        if self.destination.detach(&self.shared) {
            Ok(())
        } else {
            Err(Error::Graph("gain node is not connected".to_string()))
        }
    }

    pub fn is_connected(&self) -> bool {
        self.destination.contains(&self.shared)
    }
}

// ============================================================================
// Destination
// ============================================================================

/// Process-wide output shared by every gain stage
pub struct Destination {
    connections: Mutex<Vec<Arc<GainShared>>>,
    connect_count: AtomicU64,
    disconnect_count: AtomicU64,
    /// f32 bits of the last rendered block's peak
    last_peak: AtomicU32,
}

impl Destination {
    fn new() -> Self {
        Self {
            connections: Mutex::new(Vec::new()),
            connect_count: AtomicU64::new(0),
            disconnect_count: AtomicU64::new(0),
            last_peak: AtomicU32::new(0),
        }
    }

    fn attach(&self, gain: &Arc<GainShared>) {
        let mut connections = self.connections.lock();
        if connections.iter().any(|g| Arc::ptr_eq(g, gain)) {
            return;
        }
        connections.push(Arc::clone(gain));
        self.connect_count.fetch_add(1, Ordering::Relaxed);
        debug!("Destination: {} connected stage(s)", connections.len());
    }

    fn detach(&self, gain: &Arc<GainShared>) -> bool {
        let mut connections = self.connections.lock();
        let before = connections.len();
        connections.retain(|g| !Arc::ptr_eq(g, gain));
        let removed = connections.len() != before;
        if removed {
            self.disconnect_count.fetch_add(1, Ordering::Relaxed);
            debug!("Destination: {} connected stage(s)", connections.len());
        }
        removed
    }

    fn contains(&self, gain: &Arc<GainShared>) -> bool {
        self.connections.lock().iter().any(|g| Arc::ptr_eq(g, gain))
    }

    /// Number of gain stages currently connected
    pub fn active_connections(&self) -> usize {
        self.connections.lock().len()
    }

    /// Total successful connections since creation
    pub fn connect_count(&self) -> u64 {
        self.connect_count.load(Ordering::Relaxed)
    }

    /// Total successful disconnections since creation
    pub fn disconnect_count(&self) -> u64 {
        self.disconnect_count.load(Ordering::Relaxed)
    }

    /// Peak level of the most recent render call
    pub fn last_peak(&self) -> f32 {
        f32::from_bits(self.last_peak.load(Ordering::Relaxed))
    }

    /// Mix every connected stage into `out`.
    ///
    /// `out` is interleaved with `channels` channels; the first two carry
    /// left/right and any further channels are silent. `start_time` is the
    /// context time of the first frame.
    pub fn render(&self, out: &mut [f32], channels: usize, start_time: f64, sample_rate: u32) {
        out.fill(0.0);
        if channels == 0 || sample_rate == 0 {
            return;
        }

        let frames = out.len() / channels;
        let stages: Vec<Arc<GainShared>> = self.connections.lock().clone();

        let mut acc = vec![AudioFrame::zero(); frames];
        let mut scratch = Vec::with_capacity(frames);
        for stage in &stages {
            stage.render_into(&mut acc, start_time, sample_rate, &mut scratch);
        }

        let mut peak = 0.0f32;
        for (frame, slot) in acc.iter_mut().zip(out.chunks_mut(channels)) {
            frame.clamp();
            peak = peak.max(frame.peak());
            slot[0] = frame.left;
            if channels > 1 {
                slot[1] = frame.right;
            }
        }
        self.last_peak.store(peak.to_bits(), Ordering::Relaxed);
    }
}
