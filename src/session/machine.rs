//! Pomodoro state machine.
//!
//! Pure bookkeeping: the machine counts seconds and moves between
//! `Idle`, `Work`, `Break` and `Paused`, returning a [`Transition`] for
//! every state change. It never touches audio; the controller turns
//! transitions into playback intents.
//!
//! ```text
//!          start                 timeLeft→0                timeLeft→0, n<N
//!   Idle ───────▶ Work(1) ─────────────────▶ Break(n) ──────────────────▶ Work(n+1)
//!    ▲                 │                        │
//!    │                 │ pause                  │ timeLeft→0, n==N
//!    │                 ▼                        ▼
//!    │            Paused(resume_to)            Idle
//!    └──── reset (from any state)
//! ```

use tracing::{debug, info};

use super::error::EngineError;
use crate::types::{Channel, SessionConfig, SessionState};

// ============================================================================
// Transition
// ============================================================================

/// A state change reported by [`SessionStateMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Idle → Work(1)
    Started,
    /// Work(n) → Break(n)
    BreakStarted {
        set: u32,
        /// True if this break ends the cycle
        final_break: bool,
    },
    /// Break(n) → Work(n + 1)
    NextSetStarted { set: u32 },
    /// Break(N) → Idle
    CycleCompleted { sets: u32 },
    /// Work|Break → Paused
    Paused { channel: Channel },
    /// Paused → Work|Break
    Resumed { channel: Channel },
    /// Any → Idle
    Reset,
}

impl Transition {
    /// The channel that starts sounding after this transition, if any.
    pub fn started_channel(&self) -> Option<Channel> {
        match self {
            Transition::Started | Transition::NextSetStarted { .. } => Some(Channel::Work),
            Transition::BreakStarted { .. } => Some(Channel::Break),
            Transition::Resumed { channel } => Some(*channel),
            Transition::CycleCompleted { .. } | Transition::Paused { .. } | Transition::Reset => {
                None
            }
        }
    }

    /// Returns true if this transition leaves Work/Break for Paused or Idle.
    pub fn silences(&self) -> bool {
        matches!(
            self,
            Transition::CycleCompleted { .. } | Transition::Paused { .. } | Transition::Reset
        )
    }
}

// ============================================================================
// SessionStateMachine
// ============================================================================

/// The live timer state of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStateMachine {
    config: SessionConfig,
    state: SessionState,
    /// Channel a paused session resumes into
    resume_to: Option<Channel>,
    time_left_seconds: u32,
    total_seconds: u32,
    current_set: u32,
    total_sets: u32,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionStateMachine {
    /// Creates an idle machine. `config` is expected to be sanitized already;
    /// oversized durations saturate rather than overflow.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            resume_to: None,
            time_left_seconds: 0,
            total_seconds: 0,
            current_set: 0,
            total_sets: config.effective_total_sets(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn time_left_seconds(&self) -> u32 {
        self.time_left_seconds
    }

    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    pub fn current_set(&self) -> u32 {
        self.current_set
    }

    pub fn total_sets(&self) -> u32 {
        self.total_sets
    }

    /// Channel a paused session will resume into.
    pub fn resume_to(&self) -> Option<Channel> {
        self.resume_to
    }

    /// The channel currently counting down.
    pub fn active_channel(&self) -> Option<Channel> {
        self.state.channel()
    }

    /// True during (or paused within) the break that ends the cycle.
    pub fn is_final_break(&self) -> bool {
        let in_break = match self.state {
            SessionState::Break => true,
            SessionState::Paused => self.resume_to == Some(Channel::Break),
            SessionState::Idle | SessionState::Work => false,
        };
        in_break && self.current_set == self.total_sets
    }

    /// Replaces the configuration.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::SessionActive` unless the session is idle.
    pub fn configure(&mut self, config: SessionConfig) -> Result<(), EngineError> {
        if self.state != SessionState::Idle {
            return Err(EngineError::SessionActive);
        }
        self.config = config;
        self.total_sets = config.effective_total_sets();
        debug!("Session configured: {:?}", config);
        Ok(())
    }

    /// Starts the first work interval.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::AlreadyRunning` unless the session is idle.
    pub fn start(&mut self) -> Result<Transition, EngineError> {
        if self.state != SessionState::Idle {
            return Err(EngineError::AlreadyRunning);
        }

        self.total_sets = self.config.effective_total_sets();
        self.current_set = 1;
        self.enter(Channel::Work);
        info!("Session started: set 1/{}", self.total_sets);
        Ok(Transition::Started)
    }

    /// Suspends the countdown, remembering the running channel.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotRunning` unless in Work or Break.
    pub fn pause(&mut self) -> Result<Transition, EngineError> {
        let channel = self.active_channel().ok_or(EngineError::NotRunning)?;

        self.resume_to = Some(channel);
        self.state = SessionState::Paused;
        info!("Session paused in {} ({}s left)", channel, self.time_left_seconds);
        Ok(Transition::Paused { channel })
    }

    /// Resumes into the channel recorded at pause.
    ///
    /// Returns `Ok(None)` without changing anything if no time is left.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotPaused` unless the session is paused.
    pub fn resume(&mut self) -> Result<Option<Transition>, EngineError> {
        if self.state != SessionState::Paused {
            return Err(EngineError::NotPaused);
        }
        if self.time_left_seconds == 0 {
            debug!("Resume ignored: no time left");
            return Ok(None);
        }

        let channel = self.resume_to.unwrap_or(Channel::Work);
        self.state = channel.into();
        self.resume_to = None;
        info!("Session resumed in {} ({}s left)", channel, self.time_left_seconds);
        Ok(Some(Transition::Resumed { channel }))
    }

    /// Forces the session back to idle from any state.
    pub fn reset(&mut self) -> Transition {
        self.state = SessionState::Idle;
        self.resume_to = None;
        self.time_left_seconds = 0;
        self.total_seconds = 0;
        self.current_set = 0;
        self.total_sets = self.config.effective_total_sets();
        info!("Session reset");
        Transition::Reset
    }

    /// Advances the clock by one second.
    ///
    /// Only counts while in Work or Break. The tick that would take the
    /// remaining time below zero leaves it at zero and performs the boundary
    /// transition, so the new interval's seconds start with the next tick.
    pub fn tick(&mut self) -> Option<Transition> {
        let channel = self.active_channel()?;

        if self.time_left_seconds > 1 {
            self.time_left_seconds -= 1;
            return None;
        }

        self.time_left_seconds = 0;
        Some(self.complete_interval(channel))
    }

    fn complete_interval(&mut self, channel: Channel) -> Transition {
        match channel {
            Channel::Work => {
                self.enter(Channel::Break);
                let final_break = self.current_set == self.total_sets;
                info!(
                    "Work {}/{} finished, break started{}",
                    self.current_set,
                    self.total_sets,
                    if final_break { " (final)" } else { "" }
                );
                Transition::BreakStarted {
                    set: self.current_set,
                    final_break,
                }
            }
            Channel::Break if self.current_set < self.total_sets => {
                self.current_set += 1;
                self.enter(Channel::Work);
                info!("Set {}/{} started", self.current_set, self.total_sets);
                Transition::NextSetStarted {
                    set: self.current_set,
                }
            }
            Channel::Break => {
                let sets = self.total_sets;
                self.state = SessionState::Idle;
                self.current_set = 0;
                self.total_seconds = 0;
                info!("All {} sets completed", sets);
                Transition::CycleCompleted { sets }
            }
        }
    }

    /// Seeds a fresh interval for `channel`.
    fn enter(&mut self, channel: Channel) {
        let seconds = match channel {
            Channel::Work => self.config.work_seconds(),
            Channel::Break => self.config.break_seconds(),
        };
        self.state = channel.into();
        self.resume_to = None;
        self.time_left_seconds = seconds;
        self.total_seconds = seconds;
    }
}

// ============================================================================
// Tests
// ============================================================================
