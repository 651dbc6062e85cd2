//! Audio decoder using symphonia
//!
//! Decodes a fetched asset held in memory (MP3, FLAC, AAC/MP4, Vorbis, WAV)
//! into an interleaved stereo f32 [`AudioBuffer`].

use crate::audio::types::AudioBuffer;
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Whole-asset decoder.
pub struct SimpleDecoder;

impl SimpleDecoder {
    /// Decode an entire in-memory asset.
    ///
    /// `extension` (e.g. "ogg") is only a probe hint; the container is sniffed
    /// from the bytes either way.
    ///
    /// # Errors
    /// - Unrecognised container
    /// - No decodable audio track
    /// - Asset decoded to zero frames
    pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<AudioBuffer> {
        debug!("Decoding {} bytes (hint: {:?})", bytes.len(), extension);

        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut samples = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    warn!("Error reading packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate = spec.rate;
                    let channels = spec.channels.count();
                    let capacity = decoded.capacity();

                    let needs_new = sample_buf
                        .as_ref()
                        .map_or(true, |buf| buf.capacity() < capacity * channels);
                    if needs_new {
                        sample_buf = Some(SampleBuffer::new(capacity as u64, spec));
                    }

                    if let Some(buf) = sample_buf.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                        Self::push_stereo(buf.samples(), channels, &mut samples);
                    }
                }
                Err(symphonia::core::errors::Error::DecodeError(e)) => {
                    warn!("Decode error: {}", e);
                    continue;
                }
                Err(e) => {
                    return Err(Error::Decode(format!("Decoder failed: {}", e)));
                }
            }
        }

        let buffer = AudioBuffer::new(samples, sample_rate);
        if buffer.is_empty() {
            return Err(Error::Decode("Asset contains no audio frames".to_string()));
        }

        debug!(
            "Decoded {} frames at {} Hz ({:.2}s)",
            buffer.frame_count,
            buffer.sample_rate,
            buffer.duration_seconds()
        );
        Ok(buffer)
    }

    /// Append interleaved samples as stereo.
    ///
    /// Mono is duplicated to both channels; channels beyond the first two are dropped.
    fn push_stereo(interleaved: &[f32], channels: usize, output: &mut Vec<f32>) {
        match channels {
            0 => {}
            1 => {
                output.reserve(interleaved.len() * 2);
                for &sample in interleaved {
                    output.push(sample);
                    output.push(sample);
                }
            }
            2 => output.extend_from_slice(interleaved),
            n => {
                for frame in interleaved.chunks_exact(n) {
                    output.push(frame[0]);
                    output.push(frame[1]);
                }
            }
        }
    }
}
