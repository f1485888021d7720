//! Focus-session engine.
//!
//! - `machine`: the Pomodoro state machine (Idle / Work / Break / Paused)
//! - `effects`: the queue of deferred playback intents
//! - `controller`: wires transitions and commands to the loop scheduler
//! - `runner`: the tokio loop combining commands, session clock and audio clock
//! - `error`: engine error kinds

pub mod controller;
pub mod effects;
pub mod error;
pub mod machine;
pub mod runner;

pub use controller::{ChannelSettings, SessionController, UiCommand};
pub use effects::{PendingEffects, PlaybackIntent};
pub use error::EngineError;
pub use machine::{SessionStateMachine, Transition};
pub use runner::{run, AUDIO_PUMP_INTERVAL, SESSION_TICK};
