//! Runtime loop driving a [`SessionController`].
//!
//! Four sources are multiplexed on one task:
//! - UI commands from an mpsc channel
//! - the 1 second session clock
//! - the 20 ms audio clock that keeps crossfade loops armed
//! - the streamed track currently loading, if any
//!
//! The pending-effects queue is drained after every branch. A track load is
//! polled as its own branch, so the session clock and command intake keep
//! running while it is in flight; intents queued behind it wait for it.

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use super::controller::{SessionController, UiCommand};
use crate::sound::{AudioBackend, AudioBuffer, SoundError, TrackFetcher, TrackLoad};
use crate::types::Snapshot;

/// Period of the session clock.
pub const SESSION_TICK: Duration = Duration::from_secs(1);

/// Period of the audio pump.
pub const AUDIO_PUMP_INTERVAL: Duration = Duration::from_millis(20);

/// Runs the session until `Quit` arrives or every command sender is gone.
///
/// A snapshot is published after every command and after every tick of a
/// running session. The controller is shut down before returning.
///
/// # Errors
///
/// Returns an error if the snapshot receiver has been dropped.
pub async fn run<B: AudioBackend, F: TrackFetcher>(
    controller: &mut SessionController<B, F>,
    mut commands: mpsc::UnboundedReceiver<UiCommand>,
    snapshots: mpsc::UnboundedSender<Snapshot>,
) -> Result<()> {
    let mut session_clock = interval(SESSION_TICK);
    session_clock.set_missed_tick_behavior(MissedTickBehavior::Skip);
    session_clock.reset();

    let mut audio_clock = interval(AUDIO_PUMP_INTERVAL);
    audio_clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let publish = |snapshot: Snapshot| {
        snapshots
            .send(snapshot)
            .context("Failed to send session snapshot")
    };

    info!("Session runner started");
    publish(controller.snapshot())?;
    let mut loading: Option<TrackLoad> = None;

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("Command channel closed");
                    break;
                };
                if command == UiCommand::Quit {
                    break;
                }

                let was_running = controller.state().is_running();
                if let Err(e) = controller.apply(&command) {
                    debug!("Command {:?} rejected: {}", command, e);
                }
                // A freshly started or resumed interval gets a full first second.
                if !was_running && controller.state().is_running() {
                    session_clock.reset();
                }

                if loading.is_none() {
                    loading = controller.drain_effects();
                }
                publish(controller.snapshot())?;
            }
            _ = session_clock.tick() => {
                if !controller.state().is_running() {
                    continue;
                }
                controller.tick();
                if loading.is_none() {
                    loading = controller.drain_effects();
                }
                publish(controller.snapshot())?;
            }
            _ = audio_clock.tick() => {
                controller.pump_audio();
            }
            loaded = next_load(&mut loading), if loading.is_some() => {
                controller.finish_load(loaded);
                loading = controller.drain_effects();
                publish(controller.snapshot())?;
            }
        }
    }

    if loading.is_some() {
        debug!("Dropping track load in flight");
    }
    controller.shutdown();
    info!("Session runner stopped");
    Ok(())
}

/// Resolves with the outstanding load, or never if there is none.
async fn next_load(loading: &mut Option<TrackLoad>) -> Result<AudioBuffer, SoundError> {
    match loading {
        Some(load) => {
            let loaded = load.await;
            *loading = None;
            loaded
        }
        None => std::future::pending().await,
    }
}
