//! Test helpers for reef-tank integration tests
//!
//! - `MockTransport`: in-memory assets with scripted failures
//! - `sine_wav`: small WAV fixtures generated with hound
//! - `node_context` / `mirror`: wiring for AudioNode tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use reef_common::events::EventBus;
use reef_tank::audio::graph::AudioContext;
use reef_tank::error::{Error, Result};
use reef_tank::tile::element::MirrorElement;
use reef_tank::tile::node::{NodeContext, NodeSettings};
use reef_tank::transport::{Progress, Transport};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

pub const SAMPLE_RATE: u32 = 8000;

/// Mono 16-bit sine, `frames` long
pub fn sine_wav(frames: usize) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / SAMPLE_RATE as f32;
            let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.5;
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

#[derive(Clone)]
enum Asset {
    Bytes(Vec<u8>),
    /// Passes the existence check, then fails mid-fetch
    BrokenBody,
    /// Served after a delay
    Slow(Vec<u8>, Duration),
    /// The existence check itself errors
    FailingCheck,
}

/// Transport serving assets from memory in fixed-size chunks
pub struct MockTransport {
    assets: Mutex<HashMap<String, Asset>>,
    chunk: usize,
    exists_calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            assets: Mutex::new(HashMap::new()),
            chunk: 1024,
            exists_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_asset(self, url: &str, bytes: Vec<u8>) -> Self {
        self.assets.lock().insert(url.to_string(), Asset::Bytes(bytes));
        self
    }

    pub fn with_broken_body(self, url: &str) -> Self {
        self.assets.lock().insert(url.to_string(), Asset::BrokenBody);
        self
    }

    pub fn with_slow_asset(self, url: &str, bytes: Vec<u8>, delay: Duration) -> Self {
        self.assets
            .lock()
            .insert(url.to_string(), Asset::Slow(bytes, delay));
        self
    }

    pub fn with_failing_check(self, url: &str) -> Self {
        self.assets.lock().insert(url.to_string(), Asset::FailingCheck);
        self
    }

    /// URLs the existence check was asked about, in order
    pub fn exists_calls(&self) -> Vec<String> {
        self.exists_calls.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn exists(&self, url: &str) -> Result<bool> {
        self.exists_calls.lock().push(url.to_string());
        match self.assets.lock().get(url) {
            Some(Asset::FailingCheck) => Err(Error::Http("connection refused".to_string())),
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    async fn fetch(&self, url: &str, progress: Progress<'_>) -> Result<Vec<u8>> {
        let asset = self.assets.lock().get(url).cloned();
        let asset = match asset {
            Some(Asset::Slow(bytes, delay)) => {
                tokio::time::sleep(delay).await;
                Some(Asset::Bytes(bytes))
            }
            other => other,
        };
        match asset {
            Some(Asset::Bytes(bytes)) => {
                let total = bytes.len() as u64;
                let mut body = Vec::with_capacity(bytes.len());
                for chunk in bytes.chunks(self.chunk) {
                    body.extend_from_slice(chunk);
                    progress(body.len() as u64, Some(total));
                    tokio::task::yield_now().await;
                }
                Ok(body)
            }
            Some(Asset::BrokenBody) => {
                progress(10, Some(100));
                Err(Error::Fetch {
                    url: url.to_string(),
                    reason: "connection reset".to_string(),
                })
            }
            Some(Asset::FailingCheck) | Some(Asset::Slow(..)) | None => Err(Error::Fetch {
                url: url.to_string(),
                reason: "404".to_string(),
            }),
        }
    }
}

/// Node wiring with default timing and a fresh audio context
pub fn node_context(transport: Arc<dyn Transport>, events: Option<EventBus>) -> NodeContext {
    NodeContext {
        audio: Arc::new(AudioContext::new(SAMPLE_RATE)),
        transport,
        settings: NodeSettings::default(),
        events,
    }
}

/// Mirror element with the slider at `slider`
pub fn mirror(id: &str, slider: f64, events: Option<&EventBus>) -> Arc<MirrorElement> {
    let element = MirrorElement::new(id, None, slider);
    Arc::new(match events {
        Some(bus) => element.with_events(bus.clone()),
        None => element,
    })
}
