//! Display utilities for the focusloop CLI.
//!
//! This module provides formatted output for:
//! - Session snapshots (human readable or JSON lines)
//! - The preset catalog
//! - Success and error messages

use std::path::Path;

use serde::Serialize;

use crate::sound::{AudioBuffer, Preset, PresetRegistry};
use crate::types::{Channel, SessionState, Snapshot};

/// Catalog entry with the channel it belongs to, for JSON output.
#[derive(Debug, Serialize)]
struct PresetEntry<'a> {
    channel: Channel,
    #[serde(flatten)]
    preset: &'a Preset,
}

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Prints the commands accepted on stdin by `run`.
    pub fn show_run_help() {
        println!("コマンド: start | pause | resume | reset | status | quit");
        println!("          configure <作業分> <休憩分> <セット数>");
        println!("          track <work|break> <ID> | volume <work|break> <0-100>");
        println!("          preview <ID> [音量] | stop-preview");
    }

    /// Prints a snapshot in the requested format.
    pub fn show_snapshot(snapshot: &Snapshot, json: bool) {
        if json {
            match Self::format_snapshot_json(snapshot) {
                Ok(line) => println!("{}", line),
                Err(e) => Self::show_error(&e.to_string()),
            }
        } else {
            println!("{}", Self::format_snapshot(snapshot));
        }
    }

    /// One-line human readable snapshot, plus the last error if any.
    pub fn format_snapshot(snapshot: &Snapshot) -> String {
        let mut line = Self::state_label(snapshot);

        if snapshot.state != SessionState::Idle {
            let (left_m, left_s) = Self::format_time(snapshot.time_left_seconds);
            let (total_m, total_s) = Self::format_time(snapshot.total_seconds);
            line.push_str(&format!(
                "  {}:{:02} / {}:{:02}",
                left_m, left_s, total_m, total_s
            ));
        }
        if let Some(error) = &snapshot.last_error {
            line.push_str(&format!("\n  エラー: {}", error));
        }
        line
    }

    pub fn format_snapshot_json(snapshot: &Snapshot) -> serde_json::Result<String> {
        serde_json::to_string(snapshot)
    }

    /// State label including the set counter.
    pub fn state_label(snapshot: &Snapshot) -> String {
        let sets = format!("({}/{})", snapshot.current_set, snapshot.total_sets);
        match snapshot.state {
            SessionState::Idle => "待機中".to_string(),
            SessionState::Work => format!("作業中 {}", sets),
            SessionState::Break if snapshot.final_break => format!("最終休憩 {}", sets),
            SessionState::Break => format!("休憩中 {}", sets),
            SessionState::Paused => format!("一時停止 {}", sets),
        }
    }

    /// Prints the preset catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn show_presets(
        registry: &PresetRegistry,
        channel: Option<Channel>,
        json: bool,
    ) -> serde_json::Result<()> {
        let channels = match channel {
            Some(c) => vec![c],
            None => vec![Channel::Work, Channel::Break],
        };

        if json {
            let entries: Vec<PresetEntry<'_>> = channels
                .iter()
                .flat_map(|&channel| {
                    registry
                        .presets(channel)
                        .iter()
                        .map(move |preset| PresetEntry { channel, preset })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else {
            for channel in channels {
                print!("{}", Self::format_presets(registry, channel));
            }
        }
        Ok(())
    }

    /// Table of one channel's presets.
    pub fn format_presets(registry: &PresetRegistry, channel: Channel) -> String {
        let title = match channel {
            Channel::Work => "作業用トラック",
            Channel::Break => "休憩用トラック",
        };
        let mut out = format!("{}\n─────────────────────────────\n", title);
        for preset in registry.presets(channel) {
            out.push_str(&format!(
                "  {:<24} {:<16} {}\n",
                preset.id,
                preset.source_kind.as_str(),
                preset.display_name
            ));
        }
        out
    }

    /// Shows a success message for a rendered noise file.
    pub fn show_render_success(path: &Path, buffer: &AudioBuffer) {
        println!("* ノイズを書き出しました: {}", path.display());
        println!(
            "  {:.1}秒 / {} Hz / {} ch",
            buffer.duration(),
            buffer.sample_rate(),
            buffer.channels()
        );
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("エラー: {}", message);
    }

    /// Formats seconds as (minutes, seconds).
    fn format_time(total_seconds: u32) -> (u32, u32) {
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        (minutes, seconds)
    }
}

// ============================================================================
// Tests
// ============================================================================
