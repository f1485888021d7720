//! Decoded PCM audio shared between the cache and scheduled segments.
//!
//! Streamed tracks are decoded once into an [`AudioBuffer`] and every loop
//! segment plays from the same reference-counted samples. Generated noise is
//! produced directly as an [`AudioBuffer`] and can be written out as WAV.

use std::io::Cursor;
use std::sync::Arc;

use rodio::{Decoder, Source};

use super::error::SoundError;

/// Interleaved `f32` PCM samples with their layout.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: u16,
    sample_rate: u32,
    samples: Arc<[f32]>,
}

impl AudioBuffer {
    pub fn new(channels: u16, sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            channels: channels.max(1),
            sample_rate: sample_rate.max(1),
            samples: samples.into(),
        }
    }

    /// A buffer of `seconds` of digital silence.
    pub fn silent(channels: u16, sample_rate: u32, seconds: u32) -> Self {
        let len = usize::from(channels.max(1)) * sample_rate as usize * seconds as usize;
        Self::new(channels, sample_rate, vec![0.0; len])
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Cheap handle to the samples for a playback source.
    pub fn shared_samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|s| *s == 0.0)
    }
}

/// Decodes a complete audio file (WAV, MP3, FLAC, Vorbis) into memory.
///
/// # Errors
///
/// Returns `SoundError::DecodeFailed` if the format is not recognised or the
/// file contains no audio frames.
pub fn decode(bytes: Vec<u8>) -> Result<AudioBuffer, SoundError> {
    let decoder =
        Decoder::new(Cursor::new(bytes)).map_err(|e| SoundError::DecodeFailed(e.to_string()))?;

    let channels = decoder.channels();
    let sample_rate = decoder.sample_rate();
    let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();

    if channels == 0 || samples.len() < usize::from(channels) {
        return Err(SoundError::DecodeFailed("no audio frames".to_string()));
    }

    Ok(AudioBuffer::new(channels, sample_rate, samples))
}

/// Encodes a buffer as a 16-bit PCM WAV file.
///
/// Layout: RIFF header (12 bytes), fmt chunk (24 bytes), data chunk header
/// (8 bytes), then little-endian samples.
pub fn encode_wav(buffer: &AudioBuffer) -> Vec<u8> {
    let channels = buffer.channels();
    let sample_rate = buffer.sample_rate();
    let block_align = channels * 2;
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = (buffer.samples().len() * 2) as u32;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in buffer.samples() {
        let pcm = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        out.extend_from_slice(&pcm.to_le_bytes());
    }

    out
}
