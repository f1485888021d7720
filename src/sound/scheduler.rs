//! Seamless background-loop scheduling.
//!
//! Generated noise is short and sample-aligned, so it loops natively.
//! Streamed tracks use crossfade-loop mode: every segment plays the whole
//! buffer, the next one starts `overlap` before the current one ends, and the
//! current one is stopped `overlap` after the next one starts:
//!
//! ```text
//! segment k   |==========================|
//! segment k+1                        |==========================|
//!                                    ^   ^
//!                       start(k+1) --+   +-- stop(k) = start(k+1) + overlap
//! start(k+1) = start(k) + duration - overlap
//! ```
//!
//! Start times are derived from the previous start on the backend's audio
//! clock, never from when [`AudioLoopScheduler::pump`] happened to run, so
//! the loop does not drift with UI-thread jitter.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::buffer::{decode, AudioBuffer};
use super::error::SoundError;
use super::fetch::TrackFetcher;
use super::gain::SharedGain;
use super::noise::NoiseGenerator;
use super::subsystem::AudioSubsystem;
use super::{AudioBackend, SegmentId, SegmentRequest};
use crate::types::{PlaybackSlot, SourceKind, TrackConfig, Volume};

/// A streamed track being fetched and decoded.
///
/// Owns everything it needs, so it can be polled alongside other work while
/// the scheduler stays usable.
pub type TrackLoad = Pin<Box<dyn Future<Output = Result<AudioBuffer, SoundError>>>>;

/// Outcome of [`AudioLoopScheduler::begin_start`].
#[must_use]
pub enum StartProgress {
    /// The loop is playing (or the track is silence).
    Playing,
    /// The track must be loaded first. Hand the result to
    /// [`AudioLoopScheduler::finish_start`].
    Loading(TrackLoad),
}

impl std::fmt::Debug for StartProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Playing => f.write_str("Playing"),
            Self::Loading(_) => f.write_str("Loading(..)"),
        }
    }
}

/// Overlap between consecutive crossfade segments.
pub const CROSSFADE_OVERLAP_SECS: f64 = 0.1;

/// How far ahead of its start time a segment is handed to the backend.
pub const LOOKAHEAD_SECS: f64 = 0.25;

// ============================================================================
// CrossfadeTiming
// ============================================================================

/// Segment timing for one buffer duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossfadeTiming {
    pub duration: f64,
    pub overlap: f64,
}

impl CrossfadeTiming {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            overlap: CROSSFADE_OVERLAP_SECS,
        }
    }

    /// Buffers shorter than two overlaps are looped natively instead.
    pub fn is_viable(&self) -> bool {
        self.duration > 2.0 * self.overlap
    }

    /// Start of the segment following one that started at `previous_start`.
    pub fn next_start(&self, previous_start: f64) -> f64 {
        previous_start + self.duration - self.overlap
    }

    /// When the previous segment stops, given the next segment's start.
    pub fn stop_time(&self, next_start: f64) -> f64 {
        next_start + self.overlap
    }
}

// ============================================================================
// LoopHandle
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    id: SegmentId,
    stop_at: Option<f64>,
}

#[derive(Debug)]
enum LoopMode {
    Native {
        segment: SegmentId,
    },
    Crossfade {
        buffer: AudioBuffer,
        timing: CrossfadeTiming,
        /// Segments that may still be sounding, oldest first
        segments: Vec<Segment>,
        /// Armed start of the next segment
        next_start: f64,
    },
}

/// The single active loop, owned by the scheduler.
///
/// Dropping the handle is what cancels the armed next segment; stopping its
/// segments is what silences it.
#[derive(Debug)]
pub struct LoopHandle {
    slot: PlaybackSlot,
    track_id: String,
    gain: SharedGain,
    mode: LoopMode,
}

impl LoopHandle {
    pub fn slot(&self) -> PlaybackSlot {
        self.slot
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn gain(&self) -> f32 {
        self.gain.get()
    }

    pub fn is_crossfade(&self) -> bool {
        matches!(self.mode, LoopMode::Crossfade { .. })
    }

    /// Start time of the next crossfade segment, if one is armed.
    pub fn armed_start(&self) -> Option<f64> {
        match &self.mode {
            LoopMode::Native { .. } => None,
            LoopMode::Crossfade { next_start, .. } => Some(*next_start),
        }
    }

    fn segment_ids(&self) -> Vec<SegmentId> {
        match &self.mode {
            LoopMode::Native { segment } => vec![*segment],
            LoopMode::Crossfade { segments, .. } => segments.iter().map(|s| s.id).collect(),
        }
    }

    /// Hands every segment due within the look-ahead window to the backend.
    fn arm_due_segments<B: AudioBackend>(&mut self, backend: &mut B) -> Result<(), SoundError> {
        let LoopHandle { gain, mode, .. } = self;
        let LoopMode::Crossfade {
            buffer,
            timing,
            segments,
            next_start,
        } = mode
        else {
            return Ok(());
        };

        let now = backend.now();
        segments.retain(|s| s.stop_at.map_or(true, |stop| stop > now));

        while *next_start <= now + LOOKAHEAD_SECS {
            let start_at = *next_start;
            *next_start = timing.next_start(start_at);

            if start_at + timing.duration <= now {
                warn!("Audio pump fell behind; skipping lapsed segment at {:.3}s", start_at);
                continue;
            }

            let id = backend.schedule(SegmentRequest {
                buffer: &*buffer,
                start_at,
                looped: false,
                gain: gain.clone(),
            })?;

            let stop_at = timing.stop_time(start_at);
            if let Some(previous) = segments.last_mut() {
                backend.stop_at(previous.id, stop_at);
                previous.stop_at = Some(stop_at);
            }
            segments.push(Segment { id, stop_at: None });
            debug!("Crossfade segment {} armed at {:.3}s", id, start_at);
        }
        Ok(())
    }
}

// ============================================================================
// AudioLoopScheduler
// ============================================================================

/// Plays one track at a time as an indefinitely looping stream.
pub struct AudioLoopScheduler<B, F> {
    subsystem: AudioSubsystem<B>,
    fetcher: Arc<F>,
    /// Decoded streamed tracks keyed by locator
    cache: HashMap<String, AudioBuffer>,
    noise: NoiseGenerator,
    active: Option<LoopHandle>,
}

impl<B: AudioBackend, F: TrackFetcher> AudioLoopScheduler<B, F> {
    pub fn new(subsystem: AudioSubsystem<B>, fetcher: F) -> Self {
        Self {
            subsystem,
            fetcher: Arc::new(fetcher),
            cache: HashMap::new(),
            noise: NoiseGenerator::from_entropy(),
            active: None,
        }
    }

    /// Replaces the noise generator, e.g. with a seeded one.
    #[must_use]
    pub fn with_noise_generator(mut self, noise: NoiseGenerator) -> Self {
        self.noise = noise;
        self
    }

    /// Starts looping `track`, retiring whatever was playing first.
    ///
    /// Silence retires the previous loop and never touches the audio
    /// subsystem. On error nothing stays scheduled.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` if the device cannot be opened, `FetchFailed` or
    /// `DecodeFailed` for a bad streamed track, and `PlaybackRejected` if the
    /// backend refuses a segment.
    pub async fn start(
        &mut self,
        slot: PlaybackSlot,
        track: &TrackConfig,
    ) -> Result<(), SoundError> {
        match self.begin_start(slot, track)? {
            StartProgress::Playing => Ok(()),
            StartProgress::Loading(load) => {
                let loaded = load.await;
                self.finish_start(slot, track, loaded)
            }
        }
    }

    /// First half of [`AudioLoopScheduler::start`].
    ///
    /// Retires the previous loop and opens the device. Silence, noise and
    /// cached tracks start right away; an uncached streamed track returns a
    /// [`TrackLoad`] and nothing plays until it is passed to
    /// [`AudioLoopScheduler::finish_start`].
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` if the device cannot be opened and
    /// `PlaybackRejected` if the backend refuses a segment.
    pub fn begin_start(
        &mut self,
        slot: PlaybackSlot,
        track: &TrackConfig,
    ) -> Result<StartProgress, SoundError> {
        self.stop();

        let buffer = match track.source_kind {
            SourceKind::Silence => {
                debug!("Track '{}' is silence, nothing to play", track.id);
                return Ok(StartProgress::Playing);
            }
            SourceKind::GeneratedNoise => {
                self.subsystem.ensure_open()?;
                self.noise.generate(&track.locator)
            }
            SourceKind::StreamedFile => {
                self.subsystem.ensure_open()?;
                match self.cache.get(&track.locator) {
                    Some(buffer) => {
                        debug!("Track cache hit: {}", track.locator);
                        buffer.clone()
                    }
                    None => return Ok(StartProgress::Loading(self.load(&track.locator))),
                }
            }
        };

        self.play(slot, track, &buffer)?;
        Ok(StartProgress::Playing)
    }

    /// Second half of [`AudioLoopScheduler::start`]: caches the loaded
    /// buffer and starts the loop.
    ///
    /// # Errors
    ///
    /// Returns the load error, `Unsupported` if the device went away, or
    /// `PlaybackRejected`.
    pub fn finish_start(
        &mut self,
        slot: PlaybackSlot,
        track: &TrackConfig,
        loaded: Result<AudioBuffer, SoundError>,
    ) -> Result<(), SoundError> {
        let buffer = loaded?;
        self.cache.insert(track.locator.clone(), buffer.clone());
        // Anything started while the track was loading is retired.
        self.stop();
        self.play(slot, track, &buffer)
    }

    fn play(
        &mut self,
        slot: PlaybackSlot,
        track: &TrackConfig,
        buffer: &AudioBuffer,
    ) -> Result<(), SoundError> {
        let crossfade = track.source_kind == SourceKind::StreamedFile;
        let gain = SharedGain::new(track.volume.gain());
        let backend = self.subsystem.ensure_open()?;
        let mode = begin_loop(backend, buffer, gain.clone(), crossfade)?;

        let handle = LoopHandle {
            slot,
            track_id: track.id.clone(),
            gain,
            mode,
        };
        info!(
            "Started {} loop '{}' at {} ({})",
            slot,
            track.id,
            track.volume,
            if handle.is_crossfade() { "crossfade" } else { "native" }
        );
        self.active = Some(handle);

        self.pump()
    }

    /// Arms crossfade segments that fall inside the look-ahead window.
    ///
    /// Call this regularly (every few tens of milliseconds). If a segment
    /// cannot be scheduled the whole loop is stopped before the error is
    /// returned.
    pub fn pump(&mut self) -> Result<(), SoundError> {
        let (Some(handle), Some(backend)) = (self.active.as_mut(), self.subsystem.backend_mut())
        else {
            return Ok(());
        };

        let result = handle.arm_due_segments(backend);
        if let Err(e) = &result {
            warn!("Failed to arm next loop segment: {}", e);
            self.stop();
        }
        result
    }

    /// Stops the active loop and cancels its armed segment. Idempotent.
    pub fn stop(&mut self) {
        let Some(handle) = self.active.take() else {
            debug!("Stop requested with nothing playing");
            return;
        };

        if let Some(backend) = self.subsystem.backend_mut() {
            for id in handle.segment_ids() {
                backend.stop(id);
            }
        }
        info!("Stopped {} loop '{}'", handle.slot, handle.track_id);
    }

    /// Updates the active loop's gain in place.
    ///
    /// Returns false if nothing is playing.
    pub fn set_volume(&mut self, volume: Volume) -> bool {
        match &self.active {
            Some(handle) => {
                handle.gain.set(volume.gain());
                debug!("Volume of {} loop set to {}", handle.slot, volume);
                true
            }
            None => false,
        }
    }

    /// Stops playback and releases the audio device.
    pub fn teardown(&mut self) {
        self.stop();
        self.subsystem.teardown();
    }

    pub fn active(&self) -> Option<&LoopHandle> {
        self.active.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_audio_open(&self) -> bool {
        self.subsystem.is_open()
    }

    /// Number of decoded tracks held in the cache.
    pub fn cached_tracks(&self) -> usize {
        self.cache.len()
    }

    /// Fetches and decodes a streamed track off the scheduler.
    fn load(&self, locator: &str) -> TrackLoad {
        let fetcher = Arc::clone(&self.fetcher);
        let locator = locator.to_string();

        Box::pin(async move {
            let bytes = fetcher.fetch(&locator).await?;
            let buffer = tokio::task::spawn_blocking(move || decode(bytes))
                .await
                .map_err(|e| SoundError::DecodeFailed(e.to_string()))??;

            debug!(
                "Decoded {} ({:.1}s, {} ch, {} Hz)",
                locator,
                buffer.duration(),
                buffer.channels(),
                buffer.sample_rate()
            );
            Ok(buffer)
        })
    }
}

impl<B, F> std::fmt::Debug for AudioLoopScheduler<B, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioLoopScheduler")
            .field("subsystem", &self.subsystem)
            .field("cached", &self.cache.len())
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// Schedules the first segment of a loop.
fn begin_loop<B: AudioBackend>(
    backend: &mut B,
    buffer: &AudioBuffer,
    gain: SharedGain,
    crossfade: bool,
) -> Result<LoopMode, SoundError> {
    let start_at = backend.now();
    let timing = CrossfadeTiming::new(buffer.duration());

    if !crossfade || !timing.is_viable() {
        let segment = backend.schedule(SegmentRequest {
            buffer,
            start_at,
            looped: true,
            gain,
        })?;
        return Ok(LoopMode::Native { segment });
    }

    let id = backend.schedule(SegmentRequest {
        buffer,
        start_at,
        looped: false,
        gain,
    })?;
    Ok(LoopMode::Crossfade {
        buffer: buffer.clone(),
        timing,
        segments: vec![Segment { id, stop_at: None }],
        next_start: timing.next_start(start_at),
    })
}

// ============================================================================
// Tests
// ============================================================================
