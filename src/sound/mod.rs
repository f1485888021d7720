//! Background-audio system for focus sessions.
//!
//! This module provides seamless looping of ambient tracks, including:
//!
//! - A static preset catalog (streamed files, generated noise, silence)
//! - Procedural noise synthesis
//! - Fetch-once, decode-once track caching
//! - Crossfade-loop scheduling driven by the audio clock
//! - Graceful degradation when audio is unavailable
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │ AudioLoopScheduler │ ← start / stop / set_volume / pump
//! └─────────┬──────────┘
//!           │ owns
//!           ▼
//! ┌────────────────────┐     ┌──────────────────┐
//! │   AudioSubsystem   │────▶│  AudioBackend    │
//! │ (lazy, explicit    │     │  RodioBackend    │
//! │  teardown)         │     │  MockAudioBackend│
//! └────────────────────┘     └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use focusloop::sound::{AssetFetcher, AudioLoopScheduler, AudioSubsystem, RodioBackend};
//! use focusloop::types::{Channel, PlaybackSlot, SourceKind, TrackConfig, Volume};
//!
//! # async fn example() -> Result<(), focusloop::sound::SoundError> {
//! let subsystem = AudioSubsystem::new(RodioBackend::open);
//! let mut scheduler = AudioLoopScheduler::new(subsystem, AssetFetcher::new()?);
//!
//! let rain = TrackConfig::new("rain", SourceKind::GeneratedNoise, "rain", Volume::default());
//! scheduler.start(PlaybackSlot::Session(Channel::Work), &rain).await?;
//! scheduler.stop();
//! # Ok(())
//! # }
//! ```

mod buffer;
mod error;
mod fetch;
mod gain;
mod noise;
mod presets;
mod rodio_backend;
mod scheduler;
mod subsystem;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub use buffer::{decode, encode_wav, AudioBuffer};
pub use error::SoundError;
pub use fetch::{AssetFetcher, MockTrackFetcher, TrackFetcher, CONNECT_TIMEOUT, FETCH_TIMEOUT};
pub use gain::SharedGain;
pub use noise::{NoiseGenerator, NoiseKind, NOISE_SAMPLE_RATE, NOISE_SECONDS};
pub use presets::{is_remote, Preset, PresetRegistry, DEFAULT_WORK_TRACK, SILENCE_ID};
pub use rodio_backend::RodioBackend;
pub use scheduler::{
    AudioLoopScheduler, CrossfadeTiming, LoopHandle, StartProgress, TrackLoad,
    CROSSFADE_OVERLAP_SECS, LOOKAHEAD_SECS,
};
pub use subsystem::AudioSubsystem;

/// Identifies one scheduled playback segment inside a backend.
pub type SegmentId = u64;

/// A request to play a buffer starting at a point on the audio clock.
#[derive(Debug, Clone)]
pub struct SegmentRequest<'a> {
    pub buffer: &'a AudioBuffer,
    /// Audio-clock time in seconds at which playback begins
    pub start_at: f64,
    /// Loop the buffer natively instead of playing it once
    pub looped: bool,
    /// Gain shared with the other segments of the same loop
    pub gain: SharedGain,
}

/// The low-level playback graph.
///
/// All times are seconds on the backend's own monotonic audio clock.
pub trait AudioBackend {
    /// Current audio-clock time.
    fn now(&self) -> f64;

    /// Schedules a segment.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::PlaybackRejected` if the output refuses the segment.
    fn schedule(&mut self, request: SegmentRequest<'_>) -> Result<SegmentId, SoundError>;

    /// Stops a segment at a future audio-clock time. Times in the past stop
    /// it immediately.
    fn stop_at(&mut self, id: SegmentId, at: f64);

    /// Stops a segment immediately. Unknown ids are ignored.
    fn stop(&mut self, id: SegmentId);
}

/// A call recorded by [`MockAudioBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Schedule {
        id: SegmentId,
        start_at: f64,
        duration: f64,
        looped: bool,
    },
    StopAt {
        id: SegmentId,
        at: f64,
    },
    Stop {
        id: SegmentId,
    },
}

#[derive(Debug)]
struct MockSegment {
    start_at: f64,
    end_at: Option<f64>,
    stopped: bool,
    gain: SharedGain,
}

#[derive(Debug, Default)]
struct MockBackendState {
    now: f64,
    next_id: SegmentId,
    calls: Vec<BackendCall>,
    segments: HashMap<SegmentId, MockSegment>,
    reject_playback: bool,
}

/// Mock backend for testing.
///
/// Has a manually advanced clock and records every call. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockAudioBackend {
    state: Arc<Mutex<MockBackendState>>,
}

impl MockAudioBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the audio clock forward.
    pub fn advance(&self, seconds: f64) {
        self.state.lock().unwrap().now += seconds;
    }

    /// Makes subsequent `schedule` calls fail with `PlaybackRejected`.
    pub fn set_reject_playback(&self, reject: bool) {
        self.state.lock().unwrap().reject_playback = reject;
    }

    #[must_use]
    pub fn get_calls(&self) -> Vec<BackendCall> {
        self.state.lock().unwrap().calls.clone()
    }

    #[must_use]
    pub fn schedule_count(&self) -> usize {
        self.get_calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Schedule { .. }))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Segments that are scheduled, not stopped and not yet past their end.
    #[must_use]
    pub fn live_segments(&self) -> Vec<SegmentId> {
        let state = self.state.lock().unwrap();
        let mut ids: Vec<SegmentId> = state
            .segments
            .iter()
            .filter(|(_, s)| !s.stopped && s.end_at.map_or(true, |end| end > state.now))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Live segments whose start time has been reached.
    #[must_use]
    pub fn audible_segments(&self) -> Vec<SegmentId> {
        let now = self.now();
        let live = self.live_segments();
        let state = self.state.lock().unwrap();
        live.into_iter()
            .filter(|id| state.segments.get(id).is_some_and(|s| s.start_at <= now))
            .collect()
    }

    /// Current gain of a segment.
    #[must_use]
    pub fn gain_of(&self, id: SegmentId) -> Option<f32> {
        self.state
            .lock()
            .unwrap()
            .segments
            .get(&id)
            .map(|s| s.gain.get())
    }
}

impl AudioBackend for MockAudioBackend {
    fn now(&self) -> f64 {
        self.state.lock().unwrap().now
    }

    fn schedule(&mut self, request: SegmentRequest<'_>) -> Result<SegmentId, SoundError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_playback {
            return Err(SoundError::PlaybackRejected("mock rejection".to_string()));
        }

        state.next_id += 1;
        let id = state.next_id;
        let duration = request.buffer.duration();
        state.calls.push(BackendCall::Schedule {
            id,
            start_at: request.start_at,
            duration,
            looped: request.looped,
        });
        state.segments.insert(
            id,
            MockSegment {
                start_at: request.start_at,
                end_at: (!request.looped).then_some(request.start_at + duration),
                stopped: false,
                gain: request.gain,
            },
        );
        Ok(id)
    }

    fn stop_at(&mut self, id: SegmentId, at: f64) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(BackendCall::StopAt { id, at });
        if let Some(segment) = state.segments.get_mut(&id) {
            segment.end_at = Some(segment.end_at.map_or(at, |end| end.min(at)));
        }
    }

    fn stop(&mut self, id: SegmentId) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(BackendCall::Stop { id });
        if let Some(segment) = state.segments.get_mut(&id) {
            segment.stopped = true;
        }
    }
}
