//! Line commands read from stdin while a session runs.

use thiserror::Error;

use crate::session::UiCommand;
use crate::types::{Channel, SessionConfig};

/// A line that could not be turned into a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("不明なコマンドです: {0}")]
    UnknownCommand(String),

    #[error("使い方: {0}")]
    Usage(&'static str),

    #[error("数値ではありません: {0}")]
    NotANumber(String),

    #[error("{0}")]
    InvalidChannel(String),
}

/// Parses one input line.
///
/// Blank lines yield `Ok(None)`.
///
/// # Errors
///
/// Returns an `InputError` describing what was wrong with the line.
pub fn parse_line(line: &str) -> Result<Option<UiCommand>, InputError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&name, args)) = words.split_first() else {
        return Ok(None);
    };

    let command = match (name.to_ascii_lowercase().as_str(), args) {
        ("start", []) => UiCommand::Start,
        ("pause", []) => UiCommand::Pause,
        ("resume", []) => UiCommand::Resume,
        ("reset", []) => UiCommand::Reset,
        ("status", []) => UiCommand::Status,
        ("stop-preview", []) => UiCommand::StopPreview,
        ("quit" | "exit", []) => UiCommand::Quit,
        ("configure", [work, rest, sets]) => UiCommand::Configure(SessionConfig::new(
            number(work)?,
            number(rest)?,
            number(sets)?,
        )),
        ("configure", _) => return Err(InputError::Usage("configure <作業分> <休憩分> <セット数>")),
        ("track", [channel, id]) => UiCommand::SelectTrack {
            channel: channel_arg(channel)?,
            id: (*id).to_string(),
        },
        ("track", _) => return Err(InputError::Usage("track <work|break> <ID>")),
        ("volume", [channel, percent]) => UiCommand::SetVolume {
            channel: channel_arg(channel)?,
            percent: number(percent)?,
        },
        ("volume", _) => return Err(InputError::Usage("volume <work|break> <0-100>")),
        ("preview", [id]) => UiCommand::Preview {
            id: (*id).to_string(),
            percent: None,
        },
        ("preview", [id, percent]) => UiCommand::Preview {
            id: (*id).to_string(),
            percent: Some(number(percent)?),
        },
        ("preview", _) => return Err(InputError::Usage("preview <ID> [音量]")),
        _ => return Err(InputError::UnknownCommand(line.trim().to_string())),
    };
    Ok(Some(command))
}

fn number(s: &str) -> Result<u32, InputError> {
    s.parse().map_err(|_| InputError::NotANumber(s.to_string()))
}

fn channel_arg(s: &str) -> Result<Channel, InputError> {
    s.parse().map_err(InputError::InvalidChannel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse_line("start"), Ok(Some(UiCommand::Start)));
        assert_eq!(parse_line("  PAUSE "), Ok(Some(UiCommand::Pause)));
        assert_eq!(parse_line("resume"), Ok(Some(UiCommand::Resume)));
        assert_eq!(parse_line("reset"), Ok(Some(UiCommand::Reset)));
        assert_eq!(parse_line("status"), Ok(Some(UiCommand::Status)));
        assert_eq!(parse_line("stop-preview"), Ok(Some(UiCommand::StopPreview)));
        assert_eq!(parse_line("quit"), Ok(Some(UiCommand::Quit)));
        assert_eq!(parse_line("exit"), Ok(Some(UiCommand::Quit)));
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   \t"), Ok(None));
    }

    #[test]
    fn test_configure() {
        assert_eq!(
            parse_line("configure 50 10 2"),
            Ok(Some(UiCommand::Configure(SessionConfig::new(50, 10, 2))))
        );
        // Range checks belong to the engine; zero and large values parse.
        assert_eq!(
            parse_line("configure 0 500 0"),
            Ok(Some(UiCommand::Configure(SessionConfig::new(0, 500, 0))))
        );
        assert!(matches!(parse_line("configure 50"), Err(InputError::Usage(_))));
        assert_eq!(
            parse_line("configure x 1 1"),
            Err(InputError::NotANumber("x".to_string()))
        );
    }

    #[test]
    fn test_track_and_volume() {
        assert_eq!(
            parse_line("track break acoustic29"),
            Ok(Some(UiCommand::SelectTrack {
                channel: Channel::Break,
                id: "acoustic29".to_string()
            }))
        );
        assert_eq!(
            parse_line("volume work 0"),
            Ok(Some(UiCommand::SetVolume {
                channel: Channel::Work,
                percent: 0
            }))
        );
        assert!(matches!(
            parse_line("volume lunch 10"),
            Err(InputError::InvalidChannel(_))
        ));
        assert_eq!(
            parse_line("volume work -1"),
            Err(InputError::NotANumber("-1".to_string()))
        );
    }

    #[test]
    fn test_preview() {
        assert_eq!(
            parse_line("preview rain"),
            Ok(Some(UiCommand::Preview {
                id: "rain".to_string(),
                percent: None
            }))
        );
        assert_eq!(
            parse_line("preview acoustic07 80"),
            Ok(Some(UiCommand::Preview {
                id: "acoustic07".to_string(),
                percent: Some(80)
            }))
        );
        assert!(matches!(parse_line("preview"), Err(InputError::Usage(_))));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_line("launch rockets"),
            Err(InputError::UnknownCommand("launch rockets".to_string()))
        );
        assert!(matches!(parse_line("start now"), Err(InputError::UnknownCommand(_))));
    }
}
