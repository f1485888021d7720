//! Core data types for the focus-session engine.
//!
//! This module defines the data structures used for:
//! - Session state and the per-tick read model
//! - Session configuration with range validation
//! - Track selection (source kind, locator, volume)

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Default work duration in minutes.
pub const DEFAULT_WORK_MINUTES: u32 = 25;
/// Default break duration in minutes.
pub const DEFAULT_BREAK_MINUTES: u32 = 5;
/// Default number of sets per session.
pub const DEFAULT_TOTAL_SETS: u32 = 4;

/// Accepted work durations in minutes.
pub const WORK_MINUTES_RANGE: RangeInclusive<u32> = 1..=120;
/// Accepted break durations in minutes.
pub const BREAK_MINUTES_RANGE: RangeInclusive<u32> = 1..=60;
/// Accepted set counts.
pub const TOTAL_SETS_RANGE: RangeInclusive<u32> = 1..=10;

// ============================================================================
// SessionState
// ============================================================================

/// Represents the current state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session is running
    #[default]
    Idle,
    /// Counting down a work interval
    Work,
    /// Counting down a break interval
    Break,
    /// Countdown suspended; remembers which channel to resume into
    Paused,
}

impl SessionState {
    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Work => "work",
            SessionState::Break => "break",
            SessionState::Paused => "paused",
        }
    }

    /// Returns true if the clock is counting down.
    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Work | SessionState::Break)
    }

    /// Returns the audio channel that belongs to this state, if any.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            SessionState::Work => Some(Channel::Work),
            SessionState::Break => Some(Channel::Break),
            SessionState::Idle | SessionState::Paused => None,
        }
    }
}

// ============================================================================
// Channel
// ============================================================================

/// A session channel, each with its own selected track and volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Work,
    Break,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Work => "work",
            Channel::Break => "break",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "work" => Ok(Channel::Work),
            "break" => Ok(Channel::Break),
            other => Err(format!("unknown channel '{}' (expected work or break)", other)),
        }
    }
}

impl From<Channel> for SessionState {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Work => SessionState::Work,
            Channel::Break => SessionState::Break,
        }
    }
}

/// Who owns the single active audio loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackSlot {
    /// The loop that accompanies a running session channel
    Session(Channel),
    /// A test playback started from the settings panel
    Preview,
}

impl fmt::Display for PlaybackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackSlot::Session(channel) => write!(f, "{}", channel),
            PlaybackSlot::Preview => f.write_str("preview"),
        }
    }
}

// ============================================================================
// SessionConfig
// ============================================================================

/// A configuration field, used to report which value was corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    WorkMinutes,
    BreakMinutes,
    TotalSets,
}

impl ConfigField {
    /// The range the configuration layer accepts for this field.
    pub fn range(&self) -> RangeInclusive<u32> {
        match self {
            ConfigField::WorkMinutes => WORK_MINUTES_RANGE,
            ConfigField::BreakMinutes => BREAK_MINUTES_RANGE,
            ConfigField::TotalSets => TOTAL_SETS_RANGE,
        }
    }

    /// The value used when the field is unset or invalid.
    pub fn default_value(&self) -> u32 {
        match self {
            ConfigField::WorkMinutes => DEFAULT_WORK_MINUTES,
            ConfigField::BreakMinutes => DEFAULT_BREAK_MINUTES,
            ConfigField::TotalSets => DEFAULT_TOTAL_SETS,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfigField::WorkMinutes => "作業時間",
            ConfigField::BreakMinutes => "休憩時間",
            ConfigField::TotalSets => "セット数",
        }
    }

    /// Zero means "left empty" and is resolved to the default at seed time.
    fn accepts(&self, value: u32) -> bool {
        value == 0 || self.range().contains(&value)
    }
}

/// Session configuration as supplied by the settings form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Work duration in minutes (1-120, 0 = default)
    pub work_minutes: u32,
    /// Break duration in minutes (1-60, 0 = default)
    pub break_minutes: u32,
    /// Number of work/break sets (1-10, 0 = default)
    pub total_sets: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            work_minutes: DEFAULT_WORK_MINUTES,
            break_minutes: DEFAULT_BREAK_MINUTES,
            total_sets: DEFAULT_TOTAL_SETS,
        }
    }
}

impl SessionConfig {
    pub fn new(work_minutes: u32, break_minutes: u32, total_sets: u32) -> Self {
        Self {
            work_minutes,
            break_minutes,
            total_sets,
        }
    }

    pub fn with_work_minutes(mut self, minutes: u32) -> Self {
        self.work_minutes = minutes;
        self
    }

    pub fn with_break_minutes(mut self, minutes: u32) -> Self {
        self.break_minutes = minutes;
        self
    }

    pub fn with_total_sets(mut self, sets: u32) -> Self {
        self.total_sets = sets;
        self
    }

    /// Replaces every out-of-range field with its default.
    ///
    /// Returns the corrected configuration and the fields (with their
    /// rejected values) that had to be corrected.
    pub fn sanitized(self) -> (Self, Vec<(ConfigField, u32)>) {
        let mut corrected = Vec::new();
        let mut fix = |field: ConfigField, value: u32| {
            if field.accepts(value) {
                value
            } else {
                corrected.push((field, value));
                field.default_value()
            }
        };

        let config = Self {
            work_minutes: fix(ConfigField::WorkMinutes, self.work_minutes),
            break_minutes: fix(ConfigField::BreakMinutes, self.break_minutes),
            total_sets: fix(ConfigField::TotalSets, self.total_sets),
        };
        (config, corrected)
    }

    /// Work duration used to seed a work interval.
    pub fn work_seconds(&self) -> u32 {
        or_default(self.work_minutes, DEFAULT_WORK_MINUTES).saturating_mul(60)
    }

    /// Break duration used to seed a break interval.
    pub fn break_seconds(&self) -> u32 {
        or_default(self.break_minutes, DEFAULT_BREAK_MINUTES).saturating_mul(60)
    }

    /// Set count used when a cycle starts.
    pub fn effective_total_sets(&self) -> u32 {
        or_default(self.total_sets, DEFAULT_TOTAL_SETS)
    }
}

fn or_default(value: u32, default: u32) -> u32 {
    if value == 0 {
        default
    } else {
        value
    }
}

// ============================================================================
// Tracks
// ============================================================================

/// Where a track's audio comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// An audio file fetched once and looped with crossfades
    StreamedFile,
    /// A procedurally generated noise buffer looped natively
    GeneratedNoise,
    /// No audio at all
    Silence,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::StreamedFile => "streamed_file",
            SourceKind::GeneratedNoise => "generated_noise",
            SourceKind::Silence => "silence",
        }
    }
}

/// Playback volume in percent (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Volume(u8);

impl Volume {
    pub const MAX_PERCENT: u32 = 100;
    pub const SILENT: Volume = Volume(0);
    pub const FULL: Volume = Volume(100);

    /// Returns `None` for anything above 100.
    pub fn from_percent(percent: u32) -> Option<Self> {
        if percent <= Self::MAX_PERCENT {
            u8::try_from(percent).ok().map(Volume)
        } else {
            None
        }
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Linear mapping of 0-100 onto a 0.0-1.0 gain.
    pub fn gain(self) -> f32 {
        f32::from(self.0) / 100.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Volume(50)
    }
}

impl TryFrom<u32> for Volume {
    type Error = String;

    fn try_from(percent: u32) -> Result<Self, Self::Error> {
        Volume::from_percent(percent).ok_or_else(|| format!("volume {} is outside 0-100", percent))
    }
}

impl From<Volume> for u32 {
    fn from(volume: Volume) -> Self {
        u32::from(volume.0)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// An immutable, fully resolved track selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackConfig {
    /// Preset identifier
    pub id: String,
    /// How the audio is produced
    pub source_kind: SourceKind,
    /// URL or path for streamed files, noise tag for generated noise
    pub locator: String,
    /// Playback volume
    pub volume: Volume,
}

impl TrackConfig {
    pub fn new(
        id: impl Into<String>,
        source_kind: SourceKind,
        locator: impl Into<String>,
        volume: Volume,
    ) -> Self {
        Self {
            id: id.into(),
            source_kind,
            locator: locator.into(),
            volume,
        }
    }

    pub fn is_silence(&self) -> bool {
        self.source_kind == SourceKind::Silence
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Read model handed to the UI after every tick and command.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Current state
    pub state: SessionState,
    /// Seconds left in the current interval
    pub time_left_seconds: u32,
    /// Length of the current interval in seconds
    pub total_seconds: u32,
    /// Current set (0 while idle)
    pub current_set: u32,
    /// Number of sets in this cycle
    pub total_sets: u32,
    /// True during the break that ends the cycle
    pub final_break: bool,
    /// Last error message, cleared by the next successful playback action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Snapshot {
    /// Elapsed share of the current interval in percent.
    pub fn progress_percent(&self) -> f64 {
        if self.total_seconds == 0 {
            return 0.0;
        }
        f64::from(self.total_seconds - self.time_left_seconds) / f64::from(self.total_seconds)
            * 100.0
    }
}

// ============================================================================
// Tests
// ============================================================================
