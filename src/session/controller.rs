//! Composition root of the engine.
//!
//! `SessionController` owns the state machine and the loop scheduler. Every
//! command or tick that changes the session queues a [`PlaybackIntent`];
//! [`SessionController::drain_effects`] applies them afterwards, one at a
//! time and in order. A streamed track that still has to be loaded pauses
//! the drain: the caller drives the returned [`TrackLoad`] while the session
//! clock keeps ticking, then hands the result to
//! [`SessionController::finish_load`]. Audio failures are recorded as the
//! last error and never interrupt the timer.

use rand::Rng;
use tracing::{debug, info, warn};

use super::effects::{PendingEffects, PlaybackIntent};
use super::error::EngineError;
use super::machine::{SessionStateMachine, Transition};
use crate::sound::{
    AudioBackend, AudioBuffer, AudioLoopScheduler, PresetRegistry, SoundError, StartProgress,
    TrackFetcher, TrackLoad,
};
use crate::types::{
    Channel, PlaybackSlot, SessionConfig, SessionState, Snapshot, TrackConfig, Volume,
};

// ============================================================================
// UiCommand
// ============================================================================

/// A command issued by the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    Configure(SessionConfig),
    Start,
    Pause,
    Resume,
    Reset,
    SelectTrack { channel: Channel, id: String },
    SetVolume { channel: Channel, percent: u32 },
    Preview { id: String, percent: Option<u32> },
    StopPreview,
    /// Emit a snapshot without changing anything
    Status,
    /// Leave the run loop
    Quit,
}

/// Track and volume chosen for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSettings {
    pub track_id: String,
    pub volume: Volume,
}

// ============================================================================
// SessionController
// ============================================================================

pub struct SessionController<B, F> {
    machine: SessionStateMachine,
    scheduler: AudioLoopScheduler<B, F>,
    presets: PresetRegistry,
    work: ChannelSettings,
    rest: ChannelSettings,
    /// Track being test-played, if any
    preview: Option<TrackConfig>,
    effects: PendingEffects,
    /// Start waiting for its track to load
    loading: Option<(PlaybackSlot, TrackConfig)>,
    last_error: Option<EngineError>,
}

impl<B: AudioBackend, F: TrackFetcher> SessionController<B, F> {
    /// Creates an idle controller with default configuration, white noise
    /// for work and a random music track for breaks.
    pub fn new(scheduler: AudioLoopScheduler<B, F>, presets: PresetRegistry) -> Self {
        Self::with_rng(scheduler, presets, &mut rand::thread_rng())
    }

    /// Like [`SessionController::new`] with a caller-supplied random source.
    pub fn with_rng<R: Rng + ?Sized>(
        scheduler: AudioLoopScheduler<B, F>,
        presets: PresetRegistry,
        rng: &mut R,
    ) -> Self {
        let work = ChannelSettings {
            track_id: presets.default_track(Channel::Work, rng).to_string(),
            volume: Volume::default(),
        };
        let rest = ChannelSettings {
            track_id: presets.default_track(Channel::Break, rng).to_string(),
            volume: Volume::default(),
        };

        Self {
            machine: SessionStateMachine::default(),
            scheduler,
            presets,
            work,
            rest,
            preview: None,
            effects: PendingEffects::new(),
            loading: None,
            last_error: None,
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Replaces the session configuration.
    ///
    /// Out-of-range fields are replaced by their defaults and the
    /// configuration is still applied; the first correction is returned as
    /// `ConfigInvalid`.
    ///
    /// # Errors
    ///
    /// Returns `SessionActive` unless idle, or `ConfigInvalid` if a field
    /// was corrected.
    pub fn configure(&mut self, config: SessionConfig) -> Result<(), EngineError> {
        if self.machine.state() != SessionState::Idle {
            return self.fail(EngineError::SessionActive);
        }

        let (sanitized, corrected) = config.sanitized();
        let result = self.machine.configure(sanitized);
        self.record(result)?;

        for (field, value) in &corrected {
            warn!("{} {} out of range, using {}", field.label(), value, field.default_value());
        }
        match corrected.first() {
            Some(&(field, value)) => self.fail(EngineError::config_invalid(field, value)),
            None => Ok(()),
        }
    }

    /// # Errors
    ///
    /// Returns `AlreadyRunning` unless idle.
    pub fn start(&mut self) -> Result<(), EngineError> {
        let result = self.machine.start();
        let transition = self.record(result)?;
        self.on_transition(transition);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NotRunning` unless in Work or Break.
    pub fn pause(&mut self) -> Result<(), EngineError> {
        let result = self.machine.pause();
        let transition = self.record(result)?;
        self.on_transition(transition);
        Ok(())
    }

    /// Resuming with no time left is accepted and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `NotPaused` unless paused.
    pub fn resume(&mut self) -> Result<(), EngineError> {
        let result = self.machine.resume();
        if let Some(transition) = self.record(result)? {
            self.on_transition(transition);
        }
        Ok(())
    }

    /// Returns to idle and stops all audio, whatever the current state.
    pub fn reset(&mut self) {
        let transition = self.machine.reset();
        self.on_transition(transition);
    }

    /// Advances the session clock by one second.
    pub fn tick(&mut self) -> Option<Transition> {
        let transition = self.machine.tick()?;
        self.on_transition(transition);
        Some(transition)
    }

    /// Chooses the track for a channel and clears the last error.
    ///
    /// If that channel is sounding its loop restarts with the new track. A
    /// running preview is stopped.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTrack` if `id` is not in the channel's catalog.
    pub fn select_track(&mut self, channel: Channel, id: &str) -> Result<(), EngineError> {
        if self.presets.find(channel, id).is_none() {
            return self.fail(EngineError::unknown_track(Some(channel), id));
        }

        self.settings_mut(channel).track_id = id.to_string();
        self.last_error = None;
        info!("Track for {} set to '{}'", channel, id);

        if self.preview.is_some() {
            self.end_preview();
        } else if self.machine.active_channel() == Some(channel) {
            self.effects
                .push(PlaybackIntent::Start(PlaybackSlot::Session(channel)));
        }
        Ok(())
    }

    /// Sets a channel's volume, applying it live if that channel is sounding.
    ///
    /// # Errors
    ///
    /// Returns `VolumeOutOfRange` for anything above 100.
    pub fn set_volume(&mut self, channel: Channel, percent: u32) -> Result<(), EngineError> {
        let Some(volume) = Volume::from_percent(percent) else {
            return self.fail(EngineError::VolumeOutOfRange(percent));
        };

        self.settings_mut(channel).volume = volume;
        let slot = self.scheduler.active().map(|handle| handle.slot());
        if slot == Some(PlaybackSlot::Session(channel)) {
            self.scheduler.set_volume(volume);
        }
        debug!("Volume for {} set to {}", channel, volume);
        Ok(())
    }

    /// Test-plays a track from either catalog, preempting any other loop.
    ///
    /// # Errors
    ///
    /// Returns `VolumeOutOfRange` or `UnknownTrack`.
    pub fn preview_track(&mut self, id: &str, percent: Option<u32>) -> Result<(), EngineError> {
        let volume = match percent {
            Some(p) => match Volume::from_percent(p) {
                Some(volume) => volume,
                None => return self.fail(EngineError::VolumeOutOfRange(p)),
            },
            None => Volume::default(),
        };
        let Some(track) = self.presets.resolve_any(id, volume) else {
            return self.fail(EngineError::unknown_track(None, id));
        };

        info!("Previewing '{}' at {}", id, volume);
        self.preview = Some(track);
        self.effects.push(PlaybackIntent::Start(PlaybackSlot::Preview));
        Ok(())
    }

    /// Ends a preview. The session's own loop comes back if it is running.
    pub fn stop_preview(&mut self) {
        if self.preview.is_none() {
            debug!("Stop preview requested with no preview");
            return;
        }
        self.end_preview();
    }

    /// Dispatches a UI command. `Status` and `Quit` change nothing.
    ///
    /// # Errors
    ///
    /// Returns whatever the dispatched command returns.
    pub fn apply(&mut self, command: &UiCommand) -> Result<(), EngineError> {
        match command {
            UiCommand::Configure(config) => self.configure(*config),
            UiCommand::Start => self.start(),
            UiCommand::Pause => self.pause(),
            UiCommand::Resume => self.resume(),
            UiCommand::Reset => {
                self.reset();
                Ok(())
            }
            UiCommand::SelectTrack { channel, id } => self.select_track(*channel, id),
            UiCommand::SetVolume { channel, percent } => self.set_volume(*channel, *percent),
            UiCommand::Preview { id, percent } => self.preview_track(id, *percent),
            UiCommand::StopPreview => {
                self.stop_preview();
                Ok(())
            }
            UiCommand::Status | UiCommand::Quit => Ok(()),
        }
    }

    // ------------------------------------------------------------------------
    // Effects and audio clock
    // ------------------------------------------------------------------------

    /// Applies queued intents in order until one needs a track loaded.
    ///
    /// Returns that load; the remaining intents stay queued until
    /// [`SessionController::finish_load`] has run. Returns `None` once the
    /// queue is empty, or straight away while a load is outstanding.
    pub fn drain_effects(&mut self) -> Option<TrackLoad> {
        if self.loading.is_some() {
            return None;
        }

        while let Some(intent) = self.effects.pop() {
            let slot = match intent {
                PlaybackIntent::Start(slot) => slot,
                PlaybackIntent::Stop => {
                    self.scheduler.stop();
                    continue;
                }
            };
            let Some(track) = self.track_for(slot) else {
                debug!("Nothing to start for {}", slot);
                continue;
            };

            match self.scheduler.begin_start(slot, &track) {
                Ok(StartProgress::Playing) => self.last_error = None,
                Ok(StartProgress::Loading(load)) => {
                    debug!("Waiting for '{}' to load", track.id);
                    self.loading = Some((slot, track));
                    return Some(load);
                }
                Err(e) => self.record_error(e.into()),
            }
        }
        None
    }

    /// Starts the loop whose track finished loading.
    ///
    /// A session channel picks up its current volume, which may have changed
    /// during the load. Call [`SessionController::drain_effects`] afterwards
    /// for the intents queued behind it.
    pub fn finish_load(&mut self, loaded: Result<AudioBuffer, SoundError>) {
        let Some((slot, mut track)) = self.loading.take() else {
            debug!("Track load finished with no start waiting");
            return;
        };
        if let PlaybackSlot::Session(channel) = slot {
            track.volume = self.channel_settings(channel).volume;
        }

        match self.scheduler.finish_start(slot, &track, loaded) {
            Ok(()) => self.last_error = None,
            Err(e) => self.record_error(e.into()),
        }
    }

    /// Applies every queued intent in order, awaiting each load in turn.
    pub async fn run_pending_effects(&mut self) {
        while let Some(load) = self.drain_effects() {
            let loaded = load.await;
            self.finish_load(loaded);
        }
    }

    /// Keeps the active crossfade loop armed. Call on the audio clock.
    pub fn pump_audio(&mut self) {
        if let Err(e) = self.scheduler.pump() {
            self.record_error(e.into());
        }
    }

    /// Stops playback, drops queued effects and releases the audio device.
    pub fn shutdown(&mut self) {
        self.effects.clear();
        self.loading = None;
        self.scheduler.teardown();
        info!("Session controller shut down");
    }

    // ------------------------------------------------------------------------
    // Read model
    // ------------------------------------------------------------------------

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.machine.state(),
            time_left_seconds: self.machine.time_left_seconds(),
            total_seconds: self.machine.total_seconds(),
            current_set: self.machine.current_set(),
            total_sets: self.machine.total_sets(),
            final_break: self.machine.is_final_break(),
            last_error: self.last_error.as_ref().map(ToString::to_string),
        }
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn machine(&self) -> &SessionStateMachine {
        &self.machine
    }

    pub fn scheduler(&self) -> &AudioLoopScheduler<B, F> {
        &self.scheduler
    }

    pub fn presets(&self) -> &PresetRegistry {
        &self.presets
    }

    pub fn pending_effects(&self) -> &PendingEffects {
        &self.effects
    }

    /// True while a start waits for its track to load.
    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn last_error(&self) -> Option<&EngineError> {
        self.last_error.as_ref()
    }

    pub fn channel_settings(&self, channel: Channel) -> &ChannelSettings {
        match channel {
            Channel::Work => &self.work,
            Channel::Break => &self.rest,
        }
    }

    pub fn preview(&self) -> Option<&TrackConfig> {
        self.preview.as_ref()
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn settings_mut(&mut self, channel: Channel) -> &mut ChannelSettings {
        match channel {
            Channel::Work => &mut self.work,
            Channel::Break => &mut self.rest,
        }
    }

    fn on_transition(&mut self, transition: Transition) {
        debug!("Transition: {:?}", transition);

        if let Some(channel) = transition.started_channel() {
            if self.preview.take().is_some() {
                debug!("Session transition preempts preview");
            }
            self.effects
                .push(PlaybackIntent::Start(PlaybackSlot::Session(channel)));
        } else if transition.silences() {
            self.preview = None;
            self.effects.push(PlaybackIntent::Stop);
        }
    }

    fn end_preview(&mut self) {
        self.preview = None;
        let intent = match self.machine.active_channel() {
            Some(channel) => PlaybackIntent::Start(PlaybackSlot::Session(channel)),
            None => PlaybackIntent::Stop,
        };
        self.effects.push(intent);
    }

    /// Resolves the slot's track at the moment it is applied.
    fn track_for(&self, slot: PlaybackSlot) -> Option<TrackConfig> {
        match slot {
            PlaybackSlot::Session(channel) => {
                let settings = self.channel_settings(channel);
                self.presets
                    .resolve(channel, &settings.track_id, settings.volume)
            }
            PlaybackSlot::Preview => self.preview.clone(),
        }
    }

    fn record_error(&mut self, err: EngineError) {
        warn!("{} ({})", err, err.suggestion());
        self.last_error = Some(err);
    }

    fn record<T>(&mut self, result: Result<T, EngineError>) -> Result<T, EngineError> {
        if let Err(e) = &result {
            self.record_error(e.clone());
        }
        result
    }

    fn fail<T>(&mut self, err: EngineError) -> Result<T, EngineError> {
        self.record(Err(err))
    }
}

impl<B, F> std::fmt::Debug for SessionController<B, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("machine", &self.machine)
            .field("work", &self.work)
            .field("rest", &self.rest)
            .field("preview", &self.preview)
            .field("effects", &self.effects)
            .field("loading", &self.loading)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::{
        encode_wav, AudioBuffer, AudioSubsystem, BackendCall, MockAudioBackend, MockTrackFetcher,
        NoiseGenerator, SILENCE_ID,
    };

    type TestController = SessionController<MockAudioBackend, MockTrackFetcher>;

    struct Harness {
        controller: TestController,
        backend: MockAudioBackend,
        fetcher: MockTrackFetcher,
    }

    fn streamed_bytes() -> Vec<u8> {
        encode_wav(&AudioBuffer::new(1, 8000, vec![0.1; 8000 * 3]))
    }

    fn harness() -> Harness {
        let presets = PresetRegistry::default();
        let backend = MockAudioBackend::new();
        let mut fetcher = MockTrackFetcher::new();
        for preset in presets.presets(Channel::Break) {
            if let Some(track) = presets.resolve(Channel::Break, preset.id, Volume::default()) {
                fetcher = fetcher.with_track(track.locator, streamed_bytes());
            }
        }

        let device = backend.clone();
        let scheduler = AudioLoopScheduler::new(
            AudioSubsystem::new(move || Ok(device.clone())),
            fetcher.clone(),
        )
        .with_noise_generator(NoiseGenerator::seeded(1));

        let mut controller = SessionController::new(scheduler, presets);
        controller.select_track(Channel::Work, "white_noise").unwrap();
        controller.select_track(Channel::Break, "acoustic07").unwrap();

        Harness {
            controller,
            backend,
            fetcher,
        }
    }

    fn active_slot(controller: &TestController) -> Option<PlaybackSlot> {
        controller.scheduler().active().map(|h| h.slot())
    }

    mod command_tests {
        use super::*;

        #[tokio::test]
        async fn test_start_queues_work_loop() {
            let mut h = harness();
            h.controller.start().unwrap();

            assert_eq!(
                h.controller.pending_effects().to_vec(),
                vec![PlaybackIntent::Start(PlaybackSlot::Session(Channel::Work))]
            );
            assert_eq!(h.backend.schedule_count(), 0, "audio waits for the drain");

            h.controller.run_pending_effects().await;

            assert_eq!(active_slot(&h.controller), Some(PlaybackSlot::Session(Channel::Work)));
            assert_eq!(h.backend.live_segments().len(), 1);
        }

        #[tokio::test]
        async fn test_pause_silences_and_resume_restores_channel_and_volume() {
            let mut h = harness();
            h.controller.set_volume(Channel::Break, 30).unwrap();
            h.controller
                .configure(SessionConfig::new(1, 1, 2))
                .unwrap();
            h.controller.start().unwrap();
            for _ in 0..60 {
                h.controller.tick();
            }
            h.controller.run_pending_effects().await;
            assert_eq!(h.controller.state(), SessionState::Break);

            h.controller.pause().unwrap();
            h.controller.run_pending_effects().await;
            assert!(h.backend.live_segments().is_empty());
            assert!(!h.controller.scheduler().is_playing());

            h.controller.resume().unwrap();
            h.controller.run_pending_effects().await;
            assert_eq!(h.controller.state(), SessionState::Break);
            assert_eq!(active_slot(&h.controller), Some(PlaybackSlot::Session(Channel::Break)));
            let live = h.backend.live_segments();
            assert!((h.backend.gain_of(live[0]).unwrap() - 0.3).abs() < f32::EPSILON);
        }

        #[tokio::test]
        async fn test_stop_after_start_is_observably_last() {
            let mut h = harness();
            h.controller.start().unwrap();
            h.controller.pause().unwrap();

            h.controller.run_pending_effects().await;

            let calls = h.backend.get_calls();
            assert!(matches!(calls.first(), Some(BackendCall::Schedule { .. })));
            assert!(matches!(calls.last(), Some(BackendCall::Stop { .. })));
            assert!(h.backend.live_segments().is_empty());
        }

        #[tokio::test]
        async fn test_reset_always_stops() {
            let mut h = harness();
            h.controller.reset();
            assert_eq!(h.controller.pending_effects().to_vec(), vec![PlaybackIntent::Stop]);
            h.controller.run_pending_effects().await;
            assert!(h.backend.get_calls().is_empty());

            h.controller.start().unwrap();
            h.controller.run_pending_effects().await;
            h.controller.reset();
            h.controller.run_pending_effects().await;

            assert!(h.backend.live_segments().is_empty());
            let snapshot = h.controller.snapshot();
            assert_eq!(snapshot.state, SessionState::Idle);
            assert_eq!(snapshot.current_set, 0);
            assert_eq!(snapshot.time_left_seconds, 0);
        }

        #[tokio::test]
        async fn test_cycle_completion_stops_audio() {
            let mut h = harness();
            h.controller.configure(SessionConfig::new(1, 1, 1)).unwrap();
            h.controller.start().unwrap();
            for _ in 0..120 {
                h.controller.tick();
                h.controller.run_pending_effects().await;
            }

            assert_eq!(h.controller.state(), SessionState::Idle);
            assert!(!h.controller.scheduler().is_playing());
            assert!(h.backend.live_segments().is_empty());
            assert_eq!(h.fetcher.fetch_count(), 1);
        }

        #[test]
        fn test_configure_rejected_while_active() {
            let mut h = harness();
            h.controller.start().unwrap();

            let result = h.controller.configure(SessionConfig::new(10, 10, 2));

            assert_eq!(result, Err(EngineError::SessionActive));
            assert!(h.controller.snapshot().last_error.is_some());
        }

        #[test]
        fn test_configure_corrects_out_of_range_values() {
            let mut h = harness();

            let result = h.controller.configure(SessionConfig::new(500, 5, 11));

            assert!(matches!(result, Err(EngineError::ConfigInvalid { value: 500, .. })));
            let config = h.controller.machine().config();
            assert_eq!(config.work_minutes, 25);
            assert_eq!(config.total_sets, 4);
            assert_eq!(h.controller.snapshot().total_sets, 4);
        }

        #[test]
        fn test_rejected_commands_leave_state_alone() {
            let mut h = harness();
            assert_eq!(h.controller.pause(), Err(EngineError::NotRunning));
            assert_eq!(h.controller.resume(), Err(EngineError::NotPaused));
            assert_eq!(h.controller.state(), SessionState::Idle);
            assert!(h.controller.pending_effects().is_empty());
            assert_eq!(
                h.controller.last_error(),
                Some(&EngineError::NotPaused)
            );
        }
    }

    mod audio_tests {
        use super::*;

        #[tokio::test]
        async fn test_silence_never_opens_audio() {
            let mut h = harness();
            h.controller.select_track(Channel::Work, SILENCE_ID).unwrap();
            h.controller.start().unwrap();
            h.controller.run_pending_effects().await;

            assert!(!h.controller.scheduler().is_audio_open());
            assert!(h.backend.get_calls().is_empty());
            assert_eq!(h.controller.state(), SessionState::Work);
        }

        #[tokio::test]
        async fn test_volume_zero_keeps_loop_running() {
            let mut h = harness();
            h.controller.start().unwrap();
            h.controller.run_pending_effects().await;

            h.controller.set_volume(Channel::Work, 0).unwrap();

            assert!(h.controller.scheduler().is_playing());
            let live = h.backend.live_segments();
            assert_eq!(live.len(), 1);
            assert_eq!(h.backend.gain_of(live[0]), Some(0.0));
        }

        #[tokio::test]
        async fn test_volume_of_other_channel_is_only_stored() {
            let mut h = harness();
            h.controller.start().unwrap();
            h.controller.run_pending_effects().await;

            h.controller.set_volume(Channel::Break, 90).unwrap();

            let live = h.backend.live_segments();
            assert_eq!(h.backend.gain_of(live[0]), Some(0.5));
            assert_eq!(
                h.controller.channel_settings(Channel::Break).volume,
                Volume::from_percent(90).unwrap()
            );
        }

        #[test]
        fn test_volume_out_of_range_rejected() {
            let mut h = harness();
            assert_eq!(
                h.controller.set_volume(Channel::Work, 101),
                Err(EngineError::VolumeOutOfRange(101))
            );
            assert_eq!(h.controller.channel_settings(Channel::Work).volume, Volume::default());
        }

        #[tokio::test]
        async fn test_audio_failure_keeps_timer_running() {
            let mut h = harness();
            h.backend.set_reject_playback(true);
            h.controller.start().unwrap();
            h.controller.run_pending_effects().await;

            let snapshot = h.controller.snapshot();
            assert_eq!(snapshot.state, SessionState::Work);
            assert!(snapshot.last_error.unwrap().contains("音声の再生"));

            h.controller.tick();
            assert_eq!(h.controller.snapshot().time_left_seconds, 25 * 60 - 1);
        }

        #[tokio::test]
        async fn test_successful_playback_clears_last_error() {
            let mut h = harness();
            h.backend.set_reject_playback(true);
            h.controller.start().unwrap();
            h.controller.run_pending_effects().await;
            assert!(h.controller.last_error().is_some());

            h.backend.set_reject_playback(false);
            h.controller.pause().unwrap();
            h.controller.resume().unwrap();
            h.controller.run_pending_effects().await;

            assert!(h.controller.last_error().is_none());
            assert!(h.controller.scheduler().is_playing());
        }

        #[tokio::test]
        async fn test_select_track_restarts_sounding_channel() {
            let mut h = harness();
            h.controller.start().unwrap();
            h.controller.run_pending_effects().await;

            h.controller.select_track(Channel::Work, "rain").unwrap();
            h.controller.run_pending_effects().await;

            let handle = h.controller.scheduler().active().unwrap();
            assert_eq!(handle.track_id(), "rain");
            assert_eq!(h.backend.live_segments().len(), 1);
        }

        #[test]
        fn test_select_unknown_track() {
            let mut h = harness();
            let result = h.controller.select_track(Channel::Work, "acoustic07");
            assert!(matches!(result, Err(EngineError::UnknownTrack { .. })));
            assert_eq!(h.controller.channel_settings(Channel::Work).track_id, "white_noise");
        }

        #[tokio::test]
        async fn test_pump_rearms_streamed_break_loop() {
            let mut h = harness();
            h.controller.configure(SessionConfig::new(1, 1, 1)).unwrap();
            h.controller.start().unwrap();
            for _ in 0..60 {
                h.controller.tick();
            }
            h.controller.run_pending_effects().await;
            assert_eq!(active_slot(&h.controller), Some(PlaybackSlot::Session(Channel::Break)));

            h.backend.advance(2.8);
            h.controller.pump_audio();

            // Noise loop stopped, then two overlapping break segments.
            assert_eq!(h.backend.schedule_count(), 3);
            assert_eq!(h.backend.live_segments().len(), 2);
        }
    }

    mod preview_tests {
        use super::*;

        #[tokio::test]
        async fn test_preview_preempts_session_loop_and_stop_restores_it() {
            let mut h = harness();
            h.controller.start().unwrap();
            h.controller.run_pending_effects().await;

            h.controller.preview_track("acoustic16", Some(70)).unwrap();
            h.controller.run_pending_effects().await;
            assert_eq!(active_slot(&h.controller), Some(PlaybackSlot::Preview));
            assert_eq!(h.backend.audible_segments().len(), 1);

            h.controller.stop_preview();
            h.controller.run_pending_effects().await;
            assert_eq!(active_slot(&h.controller), Some(PlaybackSlot::Session(Channel::Work)));
            assert_eq!(h.backend.live_segments().len(), 1);
        }

        #[tokio::test]
        async fn test_preview_while_idle_then_stop() {
            let mut h = harness();
            h.controller.preview_track("ocean", None).unwrap();
            h.controller.run_pending_effects().await;
            assert_eq!(active_slot(&h.controller), Some(PlaybackSlot::Preview));

            h.controller.stop_preview();
            h.controller.run_pending_effects().await;
            assert!(!h.controller.scheduler().is_playing());

            h.controller.stop_preview();
            assert!(h.controller.pending_effects().is_empty());
        }

        #[tokio::test]
        async fn test_session_transition_preempts_preview() {
            let mut h = harness();
            h.controller.preview_track("forest", Some(40)).unwrap();
            h.controller.run_pending_effects().await;

            h.controller.start().unwrap();
            h.controller.run_pending_effects().await;

            assert!(h.controller.preview().is_none());
            assert_eq!(active_slot(&h.controller), Some(PlaybackSlot::Session(Channel::Work)));
            assert_eq!(h.backend.live_segments().len(), 1);
        }

        #[test]
        fn test_preview_rejections() {
            let mut h = harness();
            assert!(matches!(
                h.controller.preview_track("nope", None),
                Err(EngineError::UnknownTrack { .. })
            ));
            assert_eq!(
                h.controller.preview_track("rain", Some(250)),
                Err(EngineError::VolumeOutOfRange(250))
            );
            assert!(h.controller.pending_effects().is_empty());
        }
    }

    mod loading_tests {
        use super::*;

        /// Runs a 1/1/1 session into its break, leaving the break start queued.
        async fn into_break(h: &mut Harness) {
            h.controller.configure(SessionConfig::new(1, 1, 1)).unwrap();
            h.controller.start().unwrap();
            h.controller.run_pending_effects().await;
            for _ in 0..60 {
                h.controller.tick();
            }
            assert_eq!(h.controller.state(), SessionState::Break);
        }

        #[tokio::test]
        async fn test_session_clock_runs_while_track_loads() {
            let mut h = harness();
            into_break(&mut h).await;

            let load = h.controller.drain_effects().unwrap();
            assert!(h.controller.is_loading());
            assert!(!h.controller.scheduler().is_playing(), "work noise retired");

            for _ in 0..5 {
                h.controller.tick();
            }
            h.controller.set_volume(Channel::Break, 70).unwrap();
            assert_eq!(h.controller.snapshot().time_left_seconds, 55);

            h.controller.finish_load(load.await);
            assert!(h.controller.drain_effects().is_none());
            assert!(!h.controller.is_loading());

            assert_eq!(active_slot(&h.controller), Some(PlaybackSlot::Session(Channel::Break)));
            let live = h.backend.live_segments();
            assert!((h.backend.gain_of(live[0]).unwrap() - 0.7).abs() < f32::EPSILON);
            assert_eq!(h.fetcher.fetch_count(), 1);
        }

        #[tokio::test]
        async fn test_pause_during_load_stops_after_it() {
            let mut h = harness();
            into_break(&mut h).await;

            let load = h.controller.drain_effects().unwrap();
            h.controller.pause().unwrap();
            assert_eq!(h.controller.pending_effects().to_vec(), vec![PlaybackIntent::Stop]);
            assert!(h.controller.drain_effects().is_none(), "held back by the load");

            h.controller.finish_load(load.await);
            assert!(h.controller.drain_effects().is_none());

            let calls = h.backend.get_calls();
            assert!(matches!(calls.last(), Some(BackendCall::Stop { .. })));
            assert!(h.backend.live_segments().is_empty());
            assert!(!h.controller.scheduler().is_playing());
            assert!(h.controller.pending_effects().is_empty());
        }

        #[tokio::test]
        async fn test_failed_load_is_recorded() {
            let mut h = harness();
            into_break(&mut h).await;

            let _load = h.controller.drain_effects().unwrap();
            h.controller
                .finish_load(Err(SoundError::FetchFailed("timed out".to_string())));

            assert!(matches!(
                h.controller.last_error(),
                Some(EngineError::AudioFetchFailed(_))
            ));
            assert!(!h.controller.scheduler().is_playing());
            assert_eq!(h.controller.state(), SessionState::Break);
        }

        #[test]
        fn test_finish_without_load_is_ignored() {
            let mut h = harness();
            h.controller
                .finish_load(Err(SoundError::FetchFailed("late".to_string())));
            assert!(h.controller.last_error().is_none());
        }
    }

    mod snapshot_tests {
        use super::*;

        #[test]
        fn test_snapshot_example_cycle() {
            let mut h = harness();
            h.controller.configure(SessionConfig::new(25, 5, 1)).unwrap();
            h.controller.start().unwrap();

            let snapshot = h.controller.snapshot();
            assert_eq!(snapshot.time_left_seconds, 1500);
            assert_eq!(snapshot.total_seconds, 1500);
            assert_eq!(snapshot.current_set, 1);

            for _ in 0..1500 {
                h.controller.tick();
            }
            let snapshot = h.controller.snapshot();
            assert_eq!(snapshot.state, SessionState::Break);
            assert_eq!(snapshot.time_left_seconds, 300);
            assert!(snapshot.final_break);

            for _ in 0..300 {
                h.controller.tick();
            }
            let snapshot = h.controller.snapshot();
            assert_eq!(snapshot.state, SessionState::Idle);
            assert_eq!(snapshot.current_set, 0);
        }

        #[tokio::test]
        async fn test_shutdown_releases_audio() {
            let mut h = harness();
            h.controller.start().unwrap();
            h.controller.run_pending_effects().await;
            assert!(h.controller.scheduler().is_audio_open());

            h.controller.pause().unwrap();
            h.controller.shutdown();

            assert!(!h.controller.scheduler().is_audio_open());
            assert!(h.controller.pending_effects().is_empty());
            assert!(h.backend.live_segments().is_empty());
        }

        #[test]
        fn test_apply_dispatches_commands() {
            let mut h = harness();
            h.controller
                .apply(&UiCommand::Configure(SessionConfig::new(10, 2, 3)))
                .unwrap();
            h.controller.apply(&UiCommand::Start).unwrap();
            h.controller.apply(&UiCommand::Status).unwrap();
            h.controller
                .apply(&UiCommand::SetVolume {
                    channel: Channel::Work,
                    percent: 80,
                })
                .unwrap();

            let snapshot = h.controller.snapshot();
            assert_eq!(snapshot.state, SessionState::Work);
            assert_eq!(snapshot.total_seconds, 600);
            assert_eq!(snapshot.total_sets, 3);
        }
    }
}
