//! Command definitions for the study timer CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::types::RestoreChoice;

/// Longest accepted task label, in characters.
const MAX_TASK_CHARS: usize = 100;

// ============================================================================
// CLI Structure
// ============================================================================

/// Study timer CLI - Pomodoro sessions with history
#[derive(Parser, Debug)]
#[command(
    name = "study-timer",
    version,
    about = "学習用ポモドーロタイマーCLI",
    long_about = "25分の作業と5分の休憩を繰り返すポモドーロタイマー。\n\
                  4回目の作業の後は30分の長い休憩になります。\n\
                  タイマーはデーモン (study-timer daemon) が管理し、終了しても進行状況を復元できます。",
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
    /// Start the current session
    Start(StartArgs),

    /// Pause the running timer
    Pause,

    /// Resume a paused timer
    Resume,

    /// Reset the timer (history is kept)
    Reset,

    /// Set the task label
    Task {
        /// Task label (an empty label clears the current task)
        #[arg(value_parser = validate_task_label)]
        task: String,
    },

    /// Finish the current session now and move to the next one
    Complete,

    /// Show current timer status
    Status,

    /// Show completed sessions
    History(HistoryArgs),

    /// Show a live countdown until interrupted
    Watch,

    /// Answer the restore prompt after a daemon restart
    Restore {
        /// continue: keep the saved progress / fresh: discard it
        #[arg(value_enum)]
        choice: RestoreChoice,
    },

    /// Run the timer daemon in the foreground
    Daemon(DaemonArgs),

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Command Arguments
// ============================================================================

/// Arguments for the start command
#[derive(Args, Debug, Clone, Default)]
pub struct StartArgs {
    /// Task label (defaults to the label set earlier)
    #[arg(value_parser = validate_task_name)]
    pub task: Option<String>,
}

/// Arguments for the history command
#[derive(Args, Debug, Clone, Default)]
pub struct HistoryArgs {
    /// Only sessions completed today (local date)
    #[arg(long)]
    pub today: bool,
}

/// Arguments for the daemon command
#[derive(Args, Debug, Clone, Default)]
pub struct DaemonArgs {
    /// Do not play the alarm when a session finishes
    #[arg(long)]
    pub no_sound: bool,

    /// Alarm sound file (wav, mp3, ogg or flac)
    #[arg(long, value_name = "PATH")]
    pub alarm: Option<PathBuf>,
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Validates the task name.
///
/// - Must not be blank
/// - Must not exceed 100 characters
fn validate_task_name(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("タスク名は空にできません".to_string());
    }
    if trimmed.chars().count() > MAX_TASK_CHARS {
        return Err(format!(
            "タスク名は{}文字以内にしてください",
            MAX_TASK_CHARS
        ));
    }
    Ok(trimmed.to_string())
}

/// Validates a label for the task command.
///
/// Same length limit as [`validate_task_name`], but a blank label is
/// accepted and becomes the empty string.
fn validate_task_label(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        return Ok(String::new());
    }
    validate_task_name(s)
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
            let cli = Cli::parse_from(["study-timer"]);
            assert!(cli.command.is_none());
            assert!(!cli.verbose);
        }

        #[test]
        fn test_parse_verbose_flag() {
            let cli = Cli::parse_from(["study-timer", "-v", "status"]);
            assert!(cli.verbose);

            let cli = Cli::parse_from(["study-timer", "status", "--verbose"]);
            assert!(cli.verbose);
        }

        #[test]
        fn test_parse_simple_commands() {
            let cli = Cli::parse_from(["study-timer", "pause"]);
            assert!(matches!(cli.command, Some(Commands::Pause)));

            let cli = Cli::parse_from(["study-timer", "resume"]);
            assert!(matches!(cli.command, Some(Commands::Resume)));

            let cli = Cli::parse_from(["study-timer", "reset"]);
            assert!(matches!(cli.command, Some(Commands::Reset)));

            let cli = Cli::parse_from(["study-timer", "complete"]);
            assert!(matches!(cli.command, Some(Commands::Complete)));

            let cli = Cli::parse_from(["study-timer", "watch"]);
            assert!(matches!(cli.command, Some(Commands::Watch)));
        }

        #[test]
        fn test_parse_completions() {
            let cli = Cli::parse_from(["study-timer", "completions", "bash"]);
            assert!(matches!(
                cli.command,
                Some(Commands::Completions {
                    shell: clap_complete::Shell::Bash
                })
            ));
        }
    }

    // ------------------------------------------------------------------------
    // Start / Task Tests
    // ------------------------------------------------------------------------

    mod task_tests {
        use super::*;

        #[test]
        fn test_parse_start_with_task() {
            let cli = Cli::parse_from(["study-timer", "start", "Read chapter 1"]);
            match cli.command {
                Some(Commands::Start(args)) => {
                    assert_eq!(args.task, Some("Read chapter 1".to_string()));
                }
                _ => panic!("Expected Start command"),
            }
        }

        #[test]
        fn test_parse_start_without_task() {
            let cli = Cli::parse_from(["study-timer", "start"]);
            match cli.command {
                Some(Commands::Start(args)) => assert_eq!(args.task, None),
                _ => panic!("Expected Start command"),
            }
        }

        #[test]
        fn test_parse_task_trims() {
            let cli = Cli::parse_from(["study-timer", "task", "  Essay  "]);
            match cli.command {
                Some(Commands::Task { task }) => assert_eq!(task, "Essay"),
                _ => panic!("Expected Task command"),
            }
        }

        #[test]
        fn test_blank_task_clears_label() {
            let cli = Cli::try_parse_from(["study-timer", "task", "   "]).unwrap();
            match cli.command {
                Some(Commands::Task { task }) => assert!(task.is_empty()),
                _ => panic!("Expected Task command"),
            }

            let cli = Cli::try_parse_from(["study-timer", "task", ""]).unwrap();
            assert!(matches!(cli.command, Some(Commands::Task { task }) if task.is_empty()));
        }

        #[test]
        fn test_blank_start_task_rejected() {
            let result = Cli::try_parse_from(["study-timer", "start", "   "]);
            assert!(result.is_err());
        }

        #[test]
        fn test_validate_task_name() {
            assert_eq!(validate_task_name("数学"), Ok("数学".to_string()));
            assert!(validate_task_name("").is_err());
            assert!(validate_task_name(&"a".repeat(101)).is_err());
            assert!(validate_task_name(&"あ".repeat(100)).is_ok());
        }

        #[test]
        fn test_validate_task_label() {
            assert_eq!(validate_task_label(""), Ok(String::new()));
            assert_eq!(validate_task_label("  \t"), Ok(String::new()));
            assert_eq!(validate_task_label(" 物理 "), Ok("物理".to_string()));
            assert!(validate_task_label(&"a".repeat(101)).is_err());
        }
    }

    // ------------------------------------------------------------------------
    // Other Argument Tests
    // ------------------------------------------------------------------------

    mod argument_tests {
        use super::*;

        #[test]
        fn test_parse_history_today() {
            let cli = Cli::parse_from(["study-timer", "history", "--today"]);
            match cli.command {
                Some(Commands::History(args)) => assert!(args.today),
                _ => panic!("Expected History command"),
            }
        }

        #[test]
        fn test_parse_restore_choices() {
            let cli = Cli::parse_from(["study-timer", "restore", "continue"]);
            assert!(matches!(
                cli.command,
                Some(Commands::Restore {
                    choice: RestoreChoice::Continue
                })
            ));

            let cli = Cli::parse_from(["study-timer", "restore", "fresh"]);
            assert!(matches!(
                cli.command,
                Some(Commands::Restore {
                    choice: RestoreChoice::StartFresh
                })
            ));

            assert!(Cli::try_parse_from(["study-timer", "restore", "maybe"]).is_err());
        }

        #[test]
        fn test_parse_daemon_flags() {
            let cli = Cli::parse_from([
                "study-timer",
                "daemon",
                "--no-sound",
                "--alarm",
                "/tmp/bell.wav",
            ]);
            match cli.command {
                Some(Commands::Daemon(args)) => {
                    assert!(args.no_sound);
                    assert_eq!(args.alarm, Some(PathBuf::from("/tmp/bell.wav")));
                }
                _ => panic!("Expected Daemon command"),
            }
        }
    }
}
