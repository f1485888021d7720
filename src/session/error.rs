//! Session engine error types.
//!
//! None of these are fatal. Audio errors leave the timer running silently,
//! configuration errors are corrected to defaults, and command rejections
//! leave the session untouched. The message of the most recent one is shown
//! in the snapshot.

use thiserror::Error;

use crate::sound::SoundError;
use crate::types::{Channel, ConfigField};

/// Errors surfaced by the session engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A configuration value was out of range and was replaced by its default.
    #[error("{label}の値 {value} は範囲外です（{min}〜{max}）。既定値 {default} を使用します")]
    ConfigInvalid {
        label: &'static str,
        value: u32,
        min: u32,
        max: u32,
        default: u32,
    },

    /// No audio subsystem is available; the timer continues silently.
    #[error("オーディオ出力が利用できません: {0}")]
    AudioUnsupported(String),

    /// A streamed track could not be fetched.
    #[error("音声ファイルが読み込めません: {0}")]
    AudioFetchFailed(String),

    /// A streamed track could not be decoded.
    #[error("音声ファイルのデコードに失敗しました: {0}")]
    AudioDecodeFailed(String),

    /// The output refused to start playback.
    #[error("音声の再生に失敗しました: {0}")]
    AudioPlaybackRejected(String),

    /// Configuration can only change while idle.
    #[error("セッション中は設定を変更できません")]
    SessionActive,

    /// `start` while a session is already underway.
    #[error("セッションは既に実行中です")]
    AlreadyRunning,

    /// `pause` while not counting down.
    #[error("セッションは実行されていません")]
    NotRunning,

    /// `resume` while not paused.
    #[error("セッションは一時停止していません")]
    NotPaused,

    /// The track id is not in the channel's catalog.
    #[error("トラック '{id}' は{channel}チャンネルにありません")]
    UnknownTrack { channel: String, id: String },

    /// Volume above 100 percent.
    #[error("音量 {0} は範囲外です（0〜100）")]
    VolumeOutOfRange(u32),
}

impl EngineError {
    /// Builds the error for a corrected configuration field.
    pub fn config_invalid(field: ConfigField, value: u32) -> Self {
        let range = field.range();
        Self::ConfigInvalid {
            label: field.label(),
            value,
            min: *range.start(),
            max: *range.end(),
            default: field.default_value(),
        }
    }

    pub fn unknown_track(channel: Option<Channel>, id: impl Into<String>) -> Self {
        Self::UnknownTrack {
            channel: channel.map_or_else(|| "いずれの".to_string(), |c| c.to_string()),
            id: id.into(),
        }
    }

    /// Returns true for errors raised by the audio path.
    #[must_use]
    pub fn is_audio_error(&self) -> bool {
        matches!(
            self,
            Self::AudioUnsupported(_)
                | Self::AudioFetchFailed(_)
                | Self::AudioDecodeFailed(_)
                | Self::AudioPlaybackRejected(_)
        )
    }

    /// Returns true if the command was refused and nothing changed.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::SessionActive
                | Self::AlreadyRunning
                | Self::NotRunning
                | Self::NotPaused
                | Self::UnknownTrack { .. }
                | Self::VolumeOutOfRange(_)
        )
    }

    /// Returns true if the session timer continues after this error.
    ///
    /// Always true: nothing in the engine stops the timer on failure.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::ConfigInvalid { .. } => "範囲内の値を入力してください",
            Self::AudioUnsupported(_) => {
                "オーディオデバイスを接続してください（タイマーは無音で継続します）"
            }
            Self::AudioFetchFailed(_) => {
                "アセットの場所（--assets）とネットワーク接続を確認してください"
            }
            Self::AudioDecodeFailed(_) => "別のトラックを選択してください",
            Self::AudioPlaybackRejected(_) => "オーディオ設定を確認してください",
            Self::SessionActive => "reset でセッションを終了してから変更してください",
            Self::AlreadyRunning => "pause または reset を使用してください",
            Self::NotRunning => "start でセッションを開始してください",
            Self::NotPaused => "pause で一時停止してから再開してください",
            Self::UnknownTrack { .. } => "focusloop presets で利用可能なトラックを確認してください",
            Self::VolumeOutOfRange(_) => "0〜100 の値を指定してください",
        }
    }
}

impl From<SoundError> for EngineError {
    fn from(err: SoundError) -> Self {
        match err {
            SoundError::Unsupported(msg) => Self::AudioUnsupported(msg),
            SoundError::FetchFailed(msg) => Self::AudioFetchFailed(msg),
            SoundError::DecodeFailed(msg) => Self::AudioDecodeFailed(msg),
            SoundError::PlaybackRejected(msg) => Self::AudioPlaybackRejected(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_invalid_message() {
        let err = EngineError::config_invalid(ConfigField::WorkMinutes, 500);
        let msg = err.to_string();
        assert!(msg.contains("作業時間"));
        assert!(msg.contains("500"));
        assert!(msg.contains("1〜120"));
        assert!(msg.contains("25"));
    }

    #[test]
    fn test_from_sound_error_keeps_kind() {
        assert_eq!(
            EngineError::from(SoundError::Unsupported("x".into())),
            EngineError::AudioUnsupported("x".into())
        );
        assert_eq!(
            EngineError::from(SoundError::FetchFailed("x".into())),
            EngineError::AudioFetchFailed("x".into())
        );
        assert_eq!(
            EngineError::from(SoundError::DecodeFailed("x".into())),
            EngineError::AudioDecodeFailed("x".into())
        );
        assert_eq!(
            EngineError::from(SoundError::PlaybackRejected("x".into())),
            EngineError::AudioPlaybackRejected("x".into())
        );
    }

    #[test]
    fn test_audio_messages_match_sound_errors() {
        let sound = SoundError::DecodeFailed("bad header".into());
        let engine = EngineError::from(sound.clone());
        assert_eq!(engine.to_string(), sound.to_string());
    }

    #[test]
    fn test_classification() {
        assert!(EngineError::AudioFetchFailed("x".into()).is_audio_error());
        assert!(!EngineError::SessionActive.is_audio_error());
        assert!(EngineError::VolumeOutOfRange(150).is_rejection());
        assert!(!EngineError::AudioUnsupported("x".into()).is_rejection());
        assert!(EngineError::NotPaused.is_recoverable());
    }

    #[test]
    fn test_unknown_track() {
        let err = EngineError::unknown_track(Some(Channel::Break), "nope");
        assert!(err.to_string().contains("nope"));
        assert!(err.to_string().contains("break"));
        assert!(!err.suggestion().is_empty());
    }
}
