//! focusloop library
//!
//! This library provides the core functionality for the focusloop CLI.
//! It includes:
//! - A Pomodoro session engine (state machine, pending playback effects,
//!   controller and tokio run loop)
//! - A background-audio loop scheduler with crossfaded streamed tracks and
//!   natively looped generated noise
//! - A preset catalog and a procedural noise generator
//! - CLI command parsing and display utilities
//! - Type definitions for configuration, tracks and snapshots

pub mod cli;
pub mod session;
pub mod sound;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    Channel, PlaybackSlot, SessionConfig, SessionState, Snapshot, SourceKind, TrackConfig, Volume,
};

// Re-export session types
pub use session::{
    EngineError, PendingEffects, PlaybackIntent, SessionController, SessionStateMachine,
    Transition, UiCommand,
};

// Re-export sound types
pub use sound::{
    AssetFetcher, AudioBackend, AudioLoopScheduler, AudioSubsystem, MockAudioBackend,
    MockTrackFetcher, NoiseGenerator, PresetRegistry, RodioBackend, SoundError, TrackFetcher,
};
