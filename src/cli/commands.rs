//! Command definitions for the focusloop CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::sound::NoiseKind;
use crate::types::{
    Channel, SessionConfig, DEFAULT_BREAK_MINUTES, DEFAULT_TOTAL_SETS, DEFAULT_WORK_MINUTES,
};

// ============================================================================
// CLI Structure
// ============================================================================

/// focusloop - Pomodoro timer with seamless background audio
#[derive(Parser, Debug)]
#[command(
    name = "focusloop",
    version,
    about = "BGM付きポモドーロタイマー",
    long_about = "作業と休憩を繰り返すポモドーロタイマー。\n\
                  作業中はノイズ、休憩中は音楽を途切れなくループ再生します。",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run an interactive session (commands are read from stdin)
    Run(RunArgs),

    /// List the available tracks
    Presets(PresetsArgs),

    /// Write a generated noise loop to a WAV file
    Render(RenderArgs),

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Run Command Arguments
// ============================================================================

/// Arguments for the run command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Work duration in minutes (1-120)
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_WORK_MINUTES,
        value_parser = clap::value_parser!(u32).range(1..=120)
    )]
    pub work: u32,

    /// Break duration in minutes (1-60)
    #[arg(
        short,
        long = "break",
        default_value_t = DEFAULT_BREAK_MINUTES,
        value_parser = clap::value_parser!(u32).range(1..=60)
    )]
    pub break_minutes: u32,

    /// Number of work/break sets (1-10)
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_TOTAL_SETS,
        value_parser = clap::value_parser!(u32).range(1..=10)
    )]
    pub sets: u32,

    /// Track for work intervals (default: white_noise)
    #[arg(long)]
    pub work_track: Option<String>,

    /// Track for breaks (default: a random music track)
    #[arg(long)]
    pub break_track: Option<String>,

    /// Work track volume in percent (0-100)
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub work_volume: u32,

    /// Break track volume in percent (0-100)
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub break_volume: u32,

    /// Directory or base URL that track files are resolved against
    #[arg(long, default_value = "assets")]
    pub assets: String,

    /// Never open the audio device (silent timer)
    #[arg(long)]
    pub no_audio: bool,

    /// Print snapshots as JSON lines
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.work, self.break_minutes, self.sets)
    }
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            work: DEFAULT_WORK_MINUTES,
            break_minutes: DEFAULT_BREAK_MINUTES,
            sets: DEFAULT_TOTAL_SETS,
            work_track: None,
            break_track: None,
            work_volume: 50,
            break_volume: 50,
            assets: "assets".to_string(),
            no_audio: false,
            json: false,
        }
    }
}

// ============================================================================
// Presets / Render Arguments
// ============================================================================

/// Arguments for the presets command
#[derive(Args, Debug, Clone, Default)]
pub struct PresetsArgs {
    /// Only list one channel (work or break)
    #[arg(short, long)]
    pub channel: Option<Channel>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the render command
#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Noise type (white, brown, rain, ocean, forest, cafe)
    #[arg(value_parser = validate_noise_tag)]
    pub tag: String,

    /// Output WAV file
    #[arg(short, long)]
    pub out: PathBuf,

    /// Seed for a reproducible waveform
    #[arg(long)]
    pub seed: Option<u64>,
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Accepts any tag the noise generator knows, including `*_noise` aliases.
fn validate_noise_tag(s: &str) -> Result<String, String> {
    match NoiseKind::from_tag(s) {
        Some(kind) => Ok(kind.tag().to_string()),
        None => {
            let known: Vec<&str> = NoiseKind::ALL.iter().map(NoiseKind::tag).collect();
            Err(format!("不明なノイズ種別です（{}）", known.join(", ")))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // Cli Tests
    // ------------------------------------------------------------------------

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_no_args() {
            let cli = Cli::parse_from(["focusloop"]);
            assert!(cli.command.is_none());
            assert!(!cli.verbose);
        }

        #[test]
        fn test_parse_verbose_flag() {
            let cli = Cli::parse_from(["focusloop", "-v", "presets"]);
            assert!(cli.verbose);
        }

        #[test]
        fn test_parse_completions_zsh() {
            let cli = Cli::parse_from(["focusloop", "completions", "zsh"]);
            match cli.command {
                Some(Commands::Completions { shell }) => {
                    assert_eq!(shell, clap_complete::Shell::Zsh);
                }
                _ => panic!("Expected Completions command"),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Run Command Tests
    // ------------------------------------------------------------------------

    mod run_args_tests {
        use super::*;

        #[test]
        fn test_parse_run_defaults() {
            let cli = Cli::parse_from(["focusloop", "run"]);
            match cli.command {
                Some(Commands::Run(args)) => {
                    assert_eq!(args.work, 25);
                    assert_eq!(args.break_minutes, 5);
                    assert_eq!(args.sets, 4);
                    assert_eq!(args.work_volume, 50);
                    assert_eq!(args.assets, "assets");
                    assert!(args.work_track.is_none());
                    assert!(!args.no_audio);
                    assert!(!args.json);
                    assert_eq!(args.session_config(), SessionConfig::default());
                }
                _ => panic!("Expected Run command"),
            }
        }

        #[test]
        fn test_parse_run_with_options() {
            let cli = Cli::parse_from([
                "focusloop",
                "run",
                "-w",
                "50",
                "--break",
                "10",
                "--sets",
                "2",
                "--work-track",
                "rain",
                "--break-volume",
                "0",
                "--no-audio",
                "--json",
            ]);
            match cli.command {
                Some(Commands::Run(args)) => {
                    assert_eq!(args.session_config(), SessionConfig::new(50, 10, 2));
                    assert_eq!(args.work_track.as_deref(), Some("rain"));
                    assert_eq!(args.break_volume, 0);
                    assert!(args.no_audio);
                    assert!(args.json);
                }
                _ => panic!("Expected Run command"),
            }
        }

        #[test]
        fn test_out_of_range_values_rejected() {
            assert!(Cli::try_parse_from(["focusloop", "run", "--work", "0"]).is_err());
            assert!(Cli::try_parse_from(["focusloop", "run", "--work", "121"]).is_err());
            assert!(Cli::try_parse_from(["focusloop", "run", "--break", "61"]).is_err());
            assert!(Cli::try_parse_from(["focusloop", "run", "--sets", "11"]).is_err());
            assert!(Cli::try_parse_from(["focusloop", "run", "--work-volume", "101"]).is_err());
        }

        #[test]
        fn test_boundary_values_accepted() {
            let cli = Cli::try_parse_from([
                "focusloop", "run", "--work", "120", "--break", "1", "--sets", "10",
            ])
            .unwrap();
            assert!(matches!(cli.command, Some(Commands::Run(_))));
        }
    }

    // ------------------------------------------------------------------------
    // Presets / Render Tests
    // ------------------------------------------------------------------------

    mod other_command_tests {
        use super::*;

        #[test]
        fn test_parse_presets_channel() {
            let cli = Cli::parse_from(["focusloop", "presets", "--channel", "break", "--json"]);
            match cli.command {
                Some(Commands::Presets(args)) => {
                    assert_eq!(args.channel, Some(Channel::Break));
                    assert!(args.json);
                }
                _ => panic!("Expected Presets command"),
            }
            assert!(Cli::try_parse_from(["focusloop", "presets", "-c", "lunch"]).is_err());
        }

        #[test]
        fn test_parse_render_normalizes_alias() {
            let cli = Cli::parse_from(["focusloop", "render", "brown_noise", "-o", "out.wav"]);
            match cli.command {
                Some(Commands::Render(args)) => {
                    assert_eq!(args.tag, "brown");
                    assert_eq!(args.out, PathBuf::from("out.wav"));
                    assert!(args.seed.is_none());
                }
                _ => panic!("Expected Render command"),
            }
        }

        #[test]
        fn test_render_unknown_tag() {
            let result = Cli::try_parse_from(["focusloop", "render", "thunder", "-o", "x.wav"]);
            assert!(result.is_err());
        }
    }
}
