//! focusloop - Pomodoro timer with seamless background audio
//!
//! Alternates work and break intervals:
//! - generated noise loops while working
//! - relaxed music loops during breaks
//! - audio stops while paused or idle

use std::io::BufRead;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tokio::sync::mpsc;

use focusloop::cli::{parse_line, Cli, Commands, Display, RenderArgs, RunArgs};
use focusloop::session::{self, SessionController, UiCommand};
use focusloop::sound::{
    encode_wav, AssetFetcher, AudioLoopScheduler, AudioSubsystem, NoiseGenerator, PresetRegistry,
    RodioBackend,
};
use focusloop::types::{Channel, Snapshot};

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(cli.verbose);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
///
/// Logs go to stderr so that `--json` output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new(default_log_level(true))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_log_level(false)))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn default_log_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    match cli.command {
        Some(Commands::Run(args)) => run_session(args).await?,
        Some(Commands::Presets(args)) => {
            Display::show_presets(&PresetRegistry::default(), args.channel, args.json)?;
        }
        Some(Commands::Render(args)) => render(&args).await?,
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
        }
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

/// Runs an interactive session until `quit`, end of input or Ctrl-C.
async fn run_session(args: RunArgs) -> Result<()> {
    let subsystem = if args.no_audio {
        AudioSubsystem::unavailable("--no-audio")
    } else {
        AudioSubsystem::new(RodioBackend::open)
    };
    let scheduler = AudioLoopScheduler::new(subsystem, AssetFetcher::new()?);
    let mut controller = SessionController::new(scheduler, PresetRegistry::new(&args.assets));

    controller
        .configure(args.session_config())
        .context("設定を適用できません")?;
    if let Some(id) = &args.work_track {
        controller.select_track(Channel::Work, id)?;
    }
    if let Some(id) = &args.break_track {
        controller.select_track(Channel::Break, id)?;
    }
    controller.set_volume(Channel::Work, args.work_volume)?;
    controller.set_volume(Channel::Break, args.break_volume)?;

    if !args.json {
        Display::show_run_help();
    }

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (snap_tx, snap_rx) = mpsc::unbounded_channel();
    spawn_stdin_reader(cmd_tx.clone());

    let interrupt = async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cmd_tx.send(UiCommand::Quit);
        }
    };
    let session = async {
        let (result, ()) = tokio::join!(
            session::run(&mut controller, cmd_rx, snap_tx),
            print_snapshots(snap_rx, args.json)
        );
        result
    };
    tokio::pin!(session);

    tokio::select! {
        result = &mut session => return result,
        () = interrupt => {}
    }
    session.await
}

/// Feeds stdin lines to the session. End of input quits.
///
/// Runs on its own thread because a blocking stdin read cannot be cancelled.
fn spawn_stdin_reader(commands: mpsc::UnboundedSender<UiCommand>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match parse_line(&line) {
                Ok(Some(command)) => {
                    if commands.send(command).is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => Display::show_error(&e.to_string()),
            }
        }
        let _ = commands.send(UiCommand::Quit);
    });
}

async fn print_snapshots(mut snapshots: mpsc::UnboundedReceiver<Snapshot>, json: bool) {
    while let Some(snapshot) = snapshots.recv().await {
        Display::show_snapshot(&snapshot, json);
    }
}

/// Writes a generated noise buffer as a WAV file.
async fn render(args: &RenderArgs) -> Result<()> {
    let mut generator = match args.seed {
        Some(seed) => NoiseGenerator::seeded(seed),
        None => NoiseGenerator::from_entropy(),
    };
    let buffer = generator.generate(&args.tag);

    tokio::fs::write(&args.out, encode_wav(&buffer))
        .await
        .with_context(|| format!("{} に書き込めません", args.out.display()))?;

    Display::show_render_success(&args.out, &buffer);
    Ok(())
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
