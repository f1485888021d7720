//! Audio output backend using rodio.
//!
//! Each scheduled segment gets its own `Sink` so overlapping segments mix in
//! the output. The audio clock is a silent source on a dedicated sink that
//! counts the frames the output has pulled, so segment start times and the
//! crossfade arithmetic share one drift-free time base.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use tracing::debug;

use super::buffer::AudioBuffer;
use super::error::SoundError;
use super::gain::SharedGain;
use super::{AudioBackend, SegmentId, SegmentRequest};

/// Frame rate of the clock source.
const CLOCK_RATE: u32 = 48_000;

/// Stop frame meaning "play until the source ends".
const NO_STOP: u64 = u64::MAX;

/// rodio-based playback graph.
///
/// Holds the output stream, so it must stay on the thread that opened it.
pub struct RodioBackend {
    /// The audio output stream (must be kept alive for playback).
    _stream: OutputStream,
    /// Handle to the output stream for creating sinks.
    handle: OutputStreamHandle,
    /// Sink driving the clock source.
    _clock_sink: Sink,
    clock_frames: Arc<AtomicU64>,
    segments: HashMap<SegmentId, LiveSegment>,
    next_id: SegmentId,
}

struct LiveSegment {
    sink: Sink,
    start_at: f64,
    sample_rate: u32,
    stop_frame: Arc<AtomicU64>,
}

impl RodioBackend {
    /// Opens the default output device and starts the audio clock.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::Unsupported` if no output device is available and
    /// `SoundError::PlaybackRejected` if the clock sink cannot be created.
    pub fn open() -> Result<Self, SoundError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| SoundError::Unsupported(e.to_string()))?;

        let clock_frames = Arc::new(AtomicU64::new(0));
        let clock_sink =
            Sink::try_new(&handle).map_err(|e| SoundError::PlaybackRejected(e.to_string()))?;
        clock_sink.append(AudioClock {
            frames: Arc::clone(&clock_frames),
        });

        debug!("Audio output stream initialized");

        Ok(Self {
            _stream: stream,
            handle,
            _clock_sink: clock_sink,
            clock_frames,
            segments: HashMap::new(),
            next_id: 0,
        })
    }

    /// Forgets segments whose sinks have drained.
    fn prune_finished(&mut self) {
        self.segments.retain(|_, segment| !segment.sink.empty());
    }
}

impl AudioBackend for RodioBackend {
    fn now(&self) -> f64 {
        self.clock_frames.load(Ordering::Relaxed) as f64 / f64::from(CLOCK_RATE)
    }

    fn schedule(&mut self, request: SegmentRequest<'_>) -> Result<SegmentId, SoundError> {
        self.prune_finished();

        let sink = Sink::try_new(&self.handle)
            .map_err(|e| SoundError::PlaybackRejected(e.to_string()))?;

        let stop_frame = Arc::new(AtomicU64::new(NO_STOP));
        let source = ScheduledSource {
            inner: BufferSource::new(request.buffer, request.looped),
            gain: request.gain,
            stop_frame: Arc::clone(&stop_frame),
            emitted: 0,
        };
        let lead = (request.start_at - self.now()).max(0.0);
        sink.append(source.delay(Duration::from_secs_f64(lead)));

        self.next_id += 1;
        let id = self.next_id;
        self.segments.insert(
            id,
            LiveSegment {
                sink,
                start_at: request.start_at,
                sample_rate: request.buffer.sample_rate(),
                stop_frame,
            },
        );
        debug!("Segment {} scheduled at {:.3}s (lead {:.3}s)", id, request.start_at, lead);
        Ok(id)
    }

    fn stop_at(&mut self, id: SegmentId, at: f64) {
        if at <= self.now() {
            self.stop(id);
            return;
        }
        if let Some(segment) = self.segments.get(&id) {
            let frame = ((at - segment.start_at).max(0.0) * f64::from(segment.sample_rate)).round();
            segment.stop_frame.store(frame as u64, Ordering::Relaxed);
        }
    }

    fn stop(&mut self, id: SegmentId) {
        if let Some(segment) = self.segments.remove(&id) {
            segment.sink.stop();
            debug!("Segment {} stopped", id);
        }
    }
}

impl std::fmt::Debug for RodioBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioBackend")
            .field("now", &self.now())
            .field("segments", &self.segments.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Sources
// ============================================================================

/// Silent source whose consumed frames define the audio clock.
struct AudioClock {
    frames: Arc<AtomicU64>,
}

impl Iterator for AudioClock {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        self.frames.fetch_add(1, Ordering::Relaxed);
        Some(0.0)
    }
}

impl Source for AudioClock {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        CLOCK_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Plays shared samples once or in a native sample-accurate loop.
struct BufferSource {
    samples: Arc<[f32]>,
    pos: usize,
    channels: u16,
    sample_rate: u32,
    looped: bool,
}

impl BufferSource {
    fn new(buffer: &AudioBuffer, looped: bool) -> Self {
        Self {
            samples: buffer.shared_samples(),
            pos: 0,
            channels: buffer.channels(),
            sample_rate: buffer.sample_rate(),
            looped,
        }
    }
}

impl Iterator for BufferSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.pos >= self.samples.len() {
            if !self.looped || self.samples.is_empty() {
                return None;
            }
            self.pos = 0;
        }
        let sample = self.samples[self.pos];
        self.pos += 1;
        Some(sample)
    }
}

impl Source for BufferSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        if self.looped {
            return None;
        }
        let frames = self.samples.len() / usize::from(self.channels.max(1));
        Some(Duration::from_secs_f64(
            frames as f64 / f64::from(self.sample_rate),
        ))
    }
}

/// Applies the loop's shared gain and ends at the requested stop frame.
struct ScheduledSource<S> {
    inner: S,
    gain: SharedGain,
    stop_frame: Arc<AtomicU64>,
    emitted: u64,
}

impl<S: Source<Item = f32>> Iterator for ScheduledSource<S> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let frame = self.emitted / u64::from(self.inner.channels().max(1));
        if frame >= self.stop_frame.load(Ordering::Relaxed) {
            return None;
        }
        let sample = self.inner.next()?;
        self.emitted += 1;
        Some(sample * self.gain.get())
    }
}

impl<S: Source<Item = f32>> Source for ScheduledSource<S> {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}
