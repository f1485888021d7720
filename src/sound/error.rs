//! Sound system error types.
//!
//! Every error here is recoverable: the session timer keeps running and the
//! message is surfaced for display only.

use thiserror::Error;

/// Errors that can occur while starting or maintaining a background loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SoundError {
    /// No audio output is available (device missing or audio disabled).
    #[error("オーディオ出力が利用できません: {0}")]
    Unsupported(String),

    /// The track's bytes could not be fetched.
    #[error("音声ファイルが読み込めません: {0}")]
    FetchFailed(String),

    /// The fetched bytes could not be decoded.
    #[error("音声ファイルのデコードに失敗しました: {0}")]
    DecodeFailed(String),

    /// The output refused to start playback.
    #[error("音声の再生に失敗しました: {0}")]
    PlaybackRejected(String),
}

impl SoundError {
    /// Returns true if this error is related to device availability.
    #[must_use]
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::Unsupported(_) | Self::PlaybackRejected(_))
    }

    /// Returns true if this error is related to the track itself.
    #[must_use]
    pub fn is_track_error(&self) -> bool {
        matches!(self, Self::FetchFailed(_) | Self::DecodeFailed(_))
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Unsupported(_) => "オーディオデバイスを接続してください（タイマーは無音で継続します）",
            Self::FetchFailed(_) => "アセットの場所（--assets）とネットワーク接続を確認してください",
            Self::DecodeFailed(_) => "音声ファイルが破損している可能性があります",
            Self::PlaybackRejected(_) => "オーディオ設定を確認してください",
        }
    }
}
