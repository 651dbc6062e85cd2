//! Output drivers
//!
//! Pull mixed frames out of the [`Destination`](crate::audio::graph::Destination)
//! at the context's sample rate. [`NullOutput`] renders on a tokio interval and
//! discards the result (headless hosts, tests); [`DeviceOutput`] feeds a cpal
//! stream and is only built with the `device-output` feature.

use crate::audio::graph::AudioContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Frames rendered per tick by the null driver
pub const NULL_BLOCK_FRAMES: usize = 1024;

/// Renders the graph in real time and throws the samples away.
pub struct NullOutput {
    handle: JoinHandle<()>,
}

impl NullOutput {
    /// Spawn the render loop. Must be called inside a tokio runtime.
    pub fn start(ctx: Arc<AudioContext>, block_frames: usize) -> Self {
        let sample_rate = ctx.sample_rate().max(1);
        let block_frames = block_frames.max(1);
        let period = Duration::from_secs_f64(block_frames as f64 / sample_rate as f64);

        info!(
            "Null output: {} frames every {:?} at {} Hz",
            block_frames, period, sample_rate
        );

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut block = vec![0.0f32; block_frames * 2];
            loop {
                interval.tick().await;
                let now = ctx.current_time();
                ctx.destination().render(&mut block, 2, now, sample_rate);
            }
        });

        Self { handle }
    }

    pub fn stop(self) {
        debug!("Null output stopped");
        self.handle.abort();
    }
}

/// Whichever driver the scene configured
pub enum Output {
    Null(NullOutput),
    #[cfg(feature = "device-output")]
    Device(device::DeviceOutput),
}

impl Output {
    pub fn stop(self) {
        match self {
            Output::Null(null) => null.stop(),
            #[cfg(feature = "device-output")]
            Output::Device(device) => device.stop(),
        }
    }
}

#[cfg(feature = "device-output")]
pub use device::DeviceOutput;

#[cfg(feature = "device-output")]
mod device {
    use crate::audio::graph::AudioContext;
    use crate::error::{Error, Result};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{Device, SampleFormat, Stream, StreamConfig};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tracing::{debug, error, info};

    /// cpal stream fed from the graph's destination.
    pub struct DeviceOutput {
        stream: Stream,
        error_count: Arc<AtomicU32>,
    }

    impl DeviceOutput {
        /// Open the default output device and start rendering into it.
        ///
        /// # Errors
        /// - No default output device
        /// - Device rejects every stream configuration
        pub fn start(ctx: Arc<AudioContext>) -> Result<Self> {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;

            let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
            info!("Using default audio device: {}", name);

            let (config, sample_format) = best_config(&device, ctx.sample_rate())?;
            debug!(
                "Audio config: sample_rate={}, channels={}, format={:?}",
                config.sample_rate.0, config.channels, sample_format
            );

            let error_count = Arc::new(AtomicU32::new(0));
            let stream = match sample_format {
                SampleFormat::F32 => build_stream(&device, &config, ctx, &error_count, |s| s)?,
                SampleFormat::I16 => {
                    build_stream(&device, &config, ctx, &error_count, |s: f32| {
                        (s * i16::MAX as f32) as i16
                    })?
                }
                SampleFormat::U16 => {
                    build_stream(&device, &config, ctx, &error_count, |s: f32| {
                        ((s + 1.0) * 32767.5) as u16
                    })?
                }
                other => {
                    return Err(Error::AudioOutput(format!(
                        "Unsupported sample format: {:?}",
                        other
                    )));
                }
            };

            stream
                .play()
                .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

            info!("Audio stream started");
            Ok(Self {
                stream,
                error_count,
            })
        }

        /// Stream errors reported by the backend since start
        pub fn error_count(&self) -> u32 {
            self.error_count.load(Ordering::Relaxed)
        }

        pub fn stop(self) {
            if let Err(e) = self.stream.pause() {
                debug!("Pausing stream on stop failed: {}", e);
            }
            info!("Audio stream stopped");
        }
    }

    /// Prefer the context's rate in stereo f32, else whatever the device defaults to.
    fn best_config(device: &Device, sample_rate: u32) -> Result<(StreamConfig, SampleFormat)> {
        let mut supported = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        let preferred = supported.find(|c| {
            c.channels() == 2
                && c.min_sample_rate().0 <= sample_rate
                && c.max_sample_rate().0 >= sample_rate
                && c.sample_format() == SampleFormat::F32
        });

        if let Some(c) = preferred {
            let format = c.sample_format();
            return Ok((c.with_sample_rate(cpal::SampleRate(sample_rate)).config(), format));
        }

        let fallback = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let format = fallback.sample_format();
        Ok((fallback.config(), format))
    }

    fn build_stream<T, F>(
        device: &Device,
        config: &StreamConfig,
        ctx: Arc<AudioContext>,
        error_count: &Arc<AtomicU32>,
        convert: F,
    ) -> Result<Stream>
    where
        T: cpal::SizedSample + Send + 'static,
        F: Fn(f32) -> T + Send + 'static,
    {
        let channels = config.channels as usize;
        let rate = config.sample_rate.0;
        let errors = Arc::clone(error_count);
        let mut scratch: Vec<f32> = Vec::new();

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    let now = ctx.current_time();
                    ctx.destination().render(&mut scratch, channels, now, rate);
                    for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                        *out = convert(sample);
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    errors.fetch_add(1, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::types::AudioBuffer;

    #[tokio::test(start_paused = true)]
    async fn test_null_output_drives_render() {
        let ctx = Arc::new(AudioContext::new(1000));
        let source = ctx.create_buffer_source(Arc::new(AudioBuffer::new(vec![0.5; 200], 1000)));
        source.set_loop(true);
        let gain = ctx.create_gain();
        source.connect(&gain).unwrap();
        gain.connect_destination().unwrap();
        source.start().unwrap();

        let output = NullOutput::start(Arc::clone(&ctx), 100);
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert!((ctx.destination().last_peak() - 0.5).abs() < 1e-6);
        Output::Null(output).stop();
    }
}
