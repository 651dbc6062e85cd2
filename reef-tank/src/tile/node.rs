//! Audio tile lifecycle
//!
//! An [`AudioNode`] owns one looping asset: it checks the asset exists,
//! fetches and decodes it, wires a source through a gain stage into the shared
//! destination, and then fades the gain in and out as the tile is played and
//! stopped. Every bound [`TileElement`] mirrors its state.
//!
//! **Load pipeline** (load state in brackets):
//! ```text
//! [Unloaded] ─▶ existence check ─▶ [FetchStarted] ─▶ fetch ─▶ [FetchComplete]
//!   ─▶ decode, source ─▶ [SourceNodeCreated] ─▶ gain ─▶ [GainNodeCreated]
//!   ─▶ start + disconnect ─▶ [Ready]
//! ```
//! The pipeline runs on its own task, so a caller that goes away mid-load
//! does not leave the node half loaded; later callers wait on the same task.
//! Only [`AudioNode::shutdown`] cancels it.
//!
//! Any failure sets the error flag for good; the node then ignores every
//! further load, play and stop.

use crate::audio::graph::{AudioContext, BufferSourceNode, GainNode};
use crate::audio::types::AudioBuffer;
use crate::error::{Error, Result};
use crate::tile::element::TileElement;
use crate::transport::{extension_hint, Transport};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reef_common::config::AudioConfig;
use reef_common::events::{EventBus, LoadState, ReefEvent, TileColor, TileStatus};
use reef_common::{time, volume};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

/// Timing knobs shared by every node on a board
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSettings {
    /// Fade time constant in seconds
    pub time_constant: f64,
    /// Wait between starting a fade-out and disconnecting
    pub fade_window: Duration,
    /// User toggles older than this are dropped
    pub stale_after: Duration,
    pub default_volume: f32,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self::from_config(&AudioConfig::default())
    }
}

impl NodeSettings {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            time_constant: config.fade_time_constant_secs,
            fade_window: time::millis_to_duration(config.fade_window_ms),
            stale_after: time::millis_to_duration(config.stale_event_ms),
            default_volume: config.default_volume,
        }
    }
}

/// Everything a node needs from its host
#[derive(Clone)]
pub struct NodeContext {
    pub audio: Arc<AudioContext>,
    pub transport: Arc<dyn Transport>,
    pub settings: NodeSettings,
    pub events: Option<EventBus>,
}

type LoadFuture = Shared<BoxFuture<'static, Result<()>>>;

/// The running (or finished) load task and its shared outcome
struct LoadTask {
    abort: AbortHandle,
    done: LoadFuture,
}

struct NodeInner {
    elements: Vec<Arc<dyn TileElement>>,
    load_state: LoadState,
    playing: bool,
    volume: f32,
    error: bool,
    buffer: Option<Arc<AudioBuffer>>,
    source: Option<Arc<BufferSourceNode>>,
    gain: Option<Arc<GainNode>>,
    /// Bumped by shutdown; pipeline steps carrying an older value are dropped
    load_epoch: u64,
    loading: Option<LoadTask>,
    /// Bumped whenever a pending fade-out completion is superseded
    stop_epoch: u64,
    pending_stop: Option<JoinHandle<()>>,
}

/// One audio asset and the tiles that control it
pub struct AudioNode {
    src: String,
    ctx: NodeContext,
    inner: Mutex<NodeInner>,
}

impl AudioNode {
    /// Create an unloaded node bound to its first element
    pub fn new(src: impl Into<String>, element: Arc<dyn TileElement>, ctx: NodeContext) -> Self {
        let volume = ctx.settings.default_volume;
        Self {
            src: src.into(),
            ctx,
            inner: Mutex::new(NodeInner {
                elements: vec![element],
                load_state: LoadState::Unloaded,
                playing: false,
                volume,
                error: false,
                buffer: None,
                source: None,
                gain: None,
                load_epoch: 0,
                loading: None,
                stop_epoch: 0,
                pending_stop: None,
            }),
        }
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn load_state(&self) -> LoadState {
        self.inner.lock().load_state
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().playing
    }

    pub fn has_error(&self) -> bool {
        self.inner.lock().error
    }

    pub fn volume(&self) -> f32 {
        self.inner.lock().volume
    }

    /// Bound elements, first-registered first
    pub fn elements(&self) -> Vec<Arc<dyn TileElement>> {
        self.inner.lock().elements.clone()
    }

    /// Decoded asset, once fetched
    pub fn buffer(&self) -> Option<Arc<AudioBuffer>> {
        self.inner.lock().buffer.clone()
    }

    /// Current gain at the context clock, once the gain stage exists
    pub fn current_gain(&self) -> Option<f32> {
        let gain = self.inner.lock().gain.clone()?;
        Some(gain.value_at(self.ctx.audio.current_time()))
    }

    /// Whether the output is currently routed to the destination
    pub fn is_connected(&self) -> bool {
        self.inner
            .lock()
            .gain
            .as_ref()
            .map_or(false, |g| g.is_connected())
    }

    pub fn status(&self) -> TileStatus {
        let inner = self.inner.lock();
        TileStatus {
            src: self.src.clone(),
            load_state: inner.load_state,
            playing: inner.playing,
            error: inner.error,
            volume: inner.volume,
            pointers: inner.elements.len(),
        }
    }

    /// Register another element that controls this asset
    pub fn add_pointer(&self, element: Arc<dyn TileElement>) {
        let count = {
            let mut inner = self.inner.lock();
            inner.elements.push(element);
            inner.elements.len()
        };
        debug!("{} - {} bound element(s)", self.src, count);
        self.publish_status();
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Fetch, decode and wire up the asset.
    ///
    /// Starts the load task on first call; while it runs, every caller
    /// waits on the same task. Returns immediately once the node is ready
    /// or in error. The call that sees a load fail gets the error.
    pub async fn load(self: &Arc<Self>) -> Result<()> {
        let done = {
            let mut inner = self.inner.lock();
            if inner.error || inner.load_state.is_ready() {
                return Ok(());
            }
            match &inner.loading {
                Some(task) => task.done.clone(),
                None => {
                    inner.load_state = LoadState::FetchStarted;
                    let epoch = inner.load_epoch;
                    let node = Arc::clone(self);
                    let handle = tokio::spawn(async move { node.run_load(epoch).await });
                    let abort = handle.abort_handle();
                    let done = async move {
                        match handle.await {
                            Ok(result) => result,
                            // Cancelled by shutdown
                            Err(e) if e.is_cancelled() => Ok(()),
                            Err(e) => Err(Error::Tile(format!("load task failed: {}", e))),
                        }
                    }
                    .boxed()
                    .shared();
                    inner.loading = Some(LoadTask {
                        abort,
                        done: done.clone(),
                    });
                    done
                }
            }
        };
        done.await
    }

    async fn run_load(self: Arc<Self>, epoch: u64) -> Result<()> {
        self.publish_status();
        self.paint(Some(TileColor::Loading));
        self.lock();
        debug!("{} - Loading", self.src);

        let exists = match self.ctx.transport.exists(&self.src).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("{} - Existence check failed: {}", self.src, e);
                false
            }
        };
        if !exists {
            return Err(self.fail(epoch, Error::AssetUnavailable(self.src.clone())));
        }

        let elements = self.elements();
        let held_slider = elements.first().map(|e| e.slider_value());
        let progress = |loaded: u64, total: Option<u64>| {
            if let Some(total) = total.filter(|t| *t > 0) {
                let percent = loaded as f64 / total as f64 * 100.0;
                for element in &elements {
                    element.set_slider_value(percent);
                }
            }
        };
        let fetched = self.ctx.transport.fetch(&self.src, &progress).await;
        if let Some(value) = held_slider {
            for element in &elements {
                element.set_slider_value(value);
            }
        }
        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.fail(epoch, e)),
        };
        if !self.advance(epoch, LoadState::FetchComplete) {
            return Ok(());
        }

        let buffer = match self
            .ctx
            .audio
            .decode_audio_data(bytes, extension_hint(&self.src))
            .await
        {
            Ok(buffer) => buffer,
            Err(e) => return Err(self.fail(epoch, e)),
        };

        match self.build_graph(epoch, buffer) {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(e) => return Err(self.fail(epoch, e)),
        }

        self.unlock();
        info!("{} - Finished loading", self.src);
        Ok(())
    }

    /// Source and gain stage, primed with a silent start and a disconnect.
    ///
    /// Returns `false` when a shutdown overtook the load.
    fn build_graph(&self, epoch: u64, buffer: Arc<AudioBuffer>) -> Result<bool> {
        let audio = &self.ctx.audio;

        let source = Arc::new(audio.create_buffer_source(Arc::clone(&buffer)));
        source.set_loop(true);
        let stored = Arc::clone(&source);
        if !self.commit(epoch, LoadState::SourceNodeCreated, |inner| {
            inner.buffer = Some(buffer);
            inner.source = Some(stored);
        }) {
            return Ok(false);
        }

        let gain = Arc::new(audio.create_gain());
        source.connect(&gain)?;
        gain.set_value_at_time(0.0, audio.current_time());
        gain.connect_destination()?;
        let stored = Arc::clone(&gain);
        if !self.commit(epoch, LoadState::GainNodeCreated, |inner| {
            inner.gain = Some(stored);
        }) {
            let _ = gain.disconnect();
            return Ok(false);
        }

        source.start()?;
        gain.disconnect()?;
        Ok(self.advance(epoch, LoadState::Ready))
    }

    fn advance(&self, epoch: u64, state: LoadState) -> bool {
        self.commit(epoch, state, |_| {})
    }

    /// Move to `state` and apply `update` in one step, unless a shutdown
    /// has moved the node to a newer epoch
    fn commit(&self, epoch: u64, state: LoadState, update: impl FnOnce(&mut NodeInner)) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.load_epoch != epoch {
                debug!("{} - Dropping stale load step {}", self.src, state);
                return false;
            }
            debug_assert!(state > inner.load_state);
            inner.load_state = state;
            update(&mut inner);
        }
        debug!("{} - {}", self.src, state);
        self.publish_status();
        true
    }

    /// Enter the terminal error state
    fn fail(&self, epoch: u64, error: Error) -> Error {
        {
            let mut inner = self.inner.lock();
            if inner.load_epoch != epoch {
                debug!("{} - Load overtaken by shutdown: {}", self.src, error);
                return error;
            }
            inner.error = true;
        }
        warn!("{} - Load failed: {}", self.src, error);
        self.paint(Some(TileColor::Error));
        self.unlock();
        self.publish_status();
        error
    }

    /// Gain stage, if the node is ready and healthy
    fn ready_gain(inner: &NodeInner) -> Option<Arc<GainNode>> {
        if inner.error || !inner.load_state.is_ready() {
            return None;
        }
        inner.gain.clone()
    }

    // ------------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------------

    /// Fade in toward the stored volume, loading first if needed
    pub async fn play(self: &Arc<Self>) -> Result<()> {
        self.load().await?;

        let pending = {
            let mut inner = self.inner.lock();
            let Some(gain) = Self::ready_gain(&inner) else {
                return Ok(());
            };

            // A pending fade-out completion would disconnect us again
            inner.stop_epoch += 1;
            let pending = inner.pending_stop.take();

            let now = self.ctx.audio.current_time();
            gain.set_value_at_time(0.0, now);
            gain.connect_destination()?;
            gain.set_target_at_time(inner.volume, now, self.ctx.settings.time_constant);
            inner.playing = true;
            pending
        };

        if let Some(handle) = pending {
            handle.abort();
            self.unlock();
        }
        self.paint(Some(TileColor::Playing));

        debug!("{} - Started playback", self.src);
        self.publish_status();
        Ok(())
    }

    /// Fade out, then disconnect once the fade window has passed.
    ///
    /// Elements stay locked until the disconnect happens.
    pub async fn stop(self: &Arc<Self>) -> Result<()> {
        self.load().await?;
        let Some(gain) = Self::ready_gain(&self.inner.lock()) else {
            return Ok(());
        };

        self.paint(Some(TileColor::Stopped));
        gain.set_target_at_time(
            0.0,
            self.ctx.audio.current_time(),
            self.ctx.settings.time_constant,
        );
        self.lock();
        debug!("{} - Started shutdown", self.src);

        let window = self.ctx.settings.fade_window;
        let previous = {
            let mut inner = self.inner.lock();
            inner.stop_epoch += 1;
            let epoch = inner.stop_epoch;
            let node = Arc::clone(self);
            let handle = tokio::spawn(async move {
                tokio::time::sleep(window).await;
                node.finish_stop(epoch);
            });
            inner.pending_stop.replace(handle)
        };
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    /// Complete the fade-out started with `epoch`; a no-op once superseded
    fn finish_stop(&self, epoch: u64) {
        {
            let mut inner = self.inner.lock();
            if inner.stop_epoch != epoch {
                debug!("{} - Fade-out superseded", self.src);
                return;
            }
            inner.pending_stop = None;
            inner.playing = false;
            if let Some(gain) = &inner.gain {
                if let Err(e) = gain.disconnect() {
                    debug!("{} - Disconnect after fade: {}", self.src, e);
                }
            }
        }
        self.unlock();
        debug!("{} - Halted playback", self.src);
        self.publish_status();
    }

    /// Play or stop depending on the current state.
    ///
    /// `event_time` is when the triggering user event happened; a toggle
    /// whose event is older than the stale threshold is dropped and `false`
    /// is returned. Programmatic toggles pass `None` and always dispatch.
    pub async fn toggle(self: &Arc<Self>, event_time: Option<DateTime<Utc>>) -> Result<bool> {
        if let Some(at) = event_time {
            if time::is_stale(at, time::now(), self.ctx.settings.stale_after) {
                debug!("{} - Toggle event is stale, ignoring", self.src);
                return Ok(false);
            }
        }

        if self.is_playing() {
            self.stop().await?;
        } else {
            self.play().await?;
        }
        Ok(true)
    }

    /// Set the target volume and apply it right away if the gain stage exists.
    ///
    /// Every bound slider shows `display` when given, else the cube-root
    /// position of `new_volume`.
    pub fn adjust_volume(&self, new_volume: f32, display: Option<f64>) {
        let new_volume = new_volume.clamp(0.0, 1.0);
        let (gain, elements) = {
            let mut inner = self.inner.lock();
            inner.volume = new_volume;
            (inner.gain.clone(), inner.elements.clone())
        };

        if let Some(gain) = gain {
            gain.set_value_at_time(new_volume, self.ctx.audio.current_time());
        }

        let shown = display.unwrap_or_else(|| volume::slider_from_gain(new_volume));
        for element in &elements {
            element.set_slider_value(shown);
        }
        self.publish_status();
    }

    // ------------------------------------------------------------------------
    // UI
    // ------------------------------------------------------------------------

    /// Disable every bound button and slider
    pub fn lock(&self) {
        for element in self.elements() {
            element.set_button_enabled(false);
            element.set_slider_enabled(false);
        }
    }

    /// Re-enable every bound button and slider
    pub fn unlock(&self) {
        for element in self.elements() {
            element.set_button_enabled(true);
            element.set_slider_enabled(true);
        }
    }

    fn paint(&self, color: Option<TileColor>) {
        for element in self.elements() {
            element.set_color(color);
        }
    }

    fn publish_status(&self) {
        if let Some(events) = &self.ctx.events {
            events.emit_lossy(ReefEvent::TileStateChanged {
                status: self.status(),
                timestamp: time::now(),
            });
        }
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Release the graph. Each step is attempted independently and failures
    /// are only logged. A load still in flight is cancelled.
    pub fn shutdown(&self) {
        let (source, gain, pending, loading, in_flight) = {
            let mut inner = self.inner.lock();
            if inner.load_state == LoadState::Unloaded {
                return;
            }
            let in_flight = !inner.error && !inner.load_state.is_ready();
            inner.load_epoch += 1;
            inner.stop_epoch += 1;
            inner.load_state = LoadState::Unloaded;
            inner.playing = false;
            inner.buffer = None;
            (
                inner.source.take(),
                inner.gain.take(),
                inner.pending_stop.take(),
                inner.loading.take(),
                in_flight,
            )
        };

        if let Some(task) = loading {
            task.abort.abort();
        }
        if in_flight {
            debug!("{} - Load cancelled", self.src);
        }
        let aborted_stop = match pending {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        };
        if in_flight || aborted_stop {
            self.unlock();
        }

        match source.as_ref() {
            Some(source) => {
                if let Err(e) = source.stop() {
                    warn!("{} - Stopping source: {}", self.src, e);
                }
            }
            None => debug!("{} - No source to stop", self.src),
        }
        if let Some(gain) = gain.as_ref() {
            if let Err(e) = gain.disconnect() {
                warn!("{} - Disconnecting gain: {}", self.src, e);
            }
        }
        if let Some(source) = source.as_ref() {
            if let Err(e) = source.disconnect() {
                warn!("{} - Disconnecting source: {}", self.src, e);
            }
        }

        info!("{} - Shutdown", self.src);
        self.publish_status();
    }
}

impl std::fmt::Debug for AudioNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioNode")
            .field("src", &self.src)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::element::MirrorElement;
    use crate::transport::FileTransport;
    use tempfile::TempDir;

    const SAMPLE_RATE: u32 = 8000;

    fn write_tone(dir: &TempDir, name: &str) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(dir.path().join(name), spec).unwrap();
        for i in 0..2000 {
            writer.write_sample(((i % 80) as i16 - 40) * 400).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn node(dir: &TempDir) -> Arc<AudioNode> {
        write_tone(dir, "tone.wav");
        let ctx = NodeContext {
            audio: Arc::new(AudioContext::new(SAMPLE_RATE)),
            transport: Arc::new(FileTransport::new(dir.path())),
            settings: NodeSettings::default(),
            events: None,
        };
        let element = Arc::new(MirrorElement::new("tone", None, 50.0));
        Arc::new(AudioNode::new("tone.wav", element, ctx))
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_fade_out_completion_is_ignored() {
        let dir = TempDir::new().unwrap();
        let node = node(&dir);

        node.play().await.unwrap();
        node.stop().await.unwrap();
        let superseded = node.inner.lock().stop_epoch;

        // Replay before the fade window closes, then let the old completion land
        node.play().await.unwrap();
        node.finish_stop(superseded);

        assert!(node.is_playing());
        assert!(node.is_connected());
        assert!(node.elements()[0].button_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_load_steps_are_dropped() {
        let dir = TempDir::new().unwrap();
        let node = node(&dir);

        node.load().await.unwrap();
        let old_epoch = node.inner.lock().load_epoch;
        node.shutdown();

        assert!(!node.advance(old_epoch, LoadState::FetchComplete));
        let error = node.fail(old_epoch, Error::Decode("late".to_string()));
        assert!(matches!(error, Error::Decode(_)));
        assert_eq!(node.load_state(), LoadState::Unloaded);
        assert!(!node.has_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_callers_share_the_running_load() {
        let dir = TempDir::new().unwrap();
        let node = node(&dir);

        let (first, second) = tokio::join!(node.load(), node.load());
        first.unwrap();
        second.unwrap();
        assert_eq!(node.load_state(), LoadState::Ready);
        assert!(!node.is_connected());
    }
}
