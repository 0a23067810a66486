//! Study Timer CLI - Pomodoro sessions for focused study
//!
//! This tool runs a Pomodoro cycle in a background daemon:
//! - 25 minutes of focused work
//! - 5 minutes of short break
//! - 30 minutes of long break after every 4th work session

use anyhow::Result;
use chrono::Local;
use clap::{CommandFactory, Parser};

use study_timer::cli::{run_watch, Cli, Commands, DaemonArgs, Display, IpcClient};
use study_timer::daemon::{run_daemon, DaemonConfig};

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose, matches!(cli.command, Some(Commands::Daemon(_))));

    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
///
/// `RUST_LOG` wins; otherwise `--verbose` selects debug, the daemon logs at
/// info and client commands only show warnings.
fn init_tracing(verbose: bool, daemon: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = match (verbose, daemon) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if daemon {
        builder.init();
    } else {
        builder.without_time().init();
    }
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    if cli.verbose {
        tracing::debug!("Verbose mode enabled");
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Daemon(args) => start_daemon(args).await?,
        Commands::Completions { shell } => generate_completions(shell),
        command => run_client_command(command).await?,
    }

    Ok(())
}

/// Runs the daemon in the foreground.
async fn start_daemon(args: DaemonArgs) -> Result<()> {
    let config = DaemonConfig::from_env()?
        .with_sound(!args.no_sound)
        .with_alarm_path(args.alarm);
    run_daemon(config).await
}

/// Sends a command to the running daemon and shows the answer.
async fn run_client_command(command: Commands) -> Result<()> {
    let client = IpcClient::new()?;

    match command {
        Commands::Start(args) => {
            let response = client.start(args.task).await?;
            Display::show_start_success(&response);
        }
        Commands::Pause => {
            let response = client.pause().await?;
            Display::show_pause_success(&response);
        }
        Commands::Resume => {
            let response = client.resume().await?;
            Display::show_resume_success(&response);
        }
        Commands::Reset => {
            let response = client.reset().await?;
            Display::show_reset_success(&response);
        }
        Commands::Task { task } => {
            let response = client.set_task(task).await?;
            Display::show_task_success(&response);
        }
        Commands::Complete => {
            let response = client.complete().await?;
            Display::show_complete_success(&response);
        }
        Commands::Status => {
            let response = client.status().await?;
            Display::show_status(&response);
        }
        Commands::History(args) => {
            let response = client.history().await?;
            let day = args.today.then(|| Local::now().date_naive());
            Display::show_history(&response, day);
        }
        Commands::Watch => run_watch(&client).await?,
        Commands::Restore { choice } => {
            let response = client.restore(choice).await?;
            Display::show_restore_success(&response);
        }
        Commands::Daemon(_) | Commands::Completions { .. } => {}
    }

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
