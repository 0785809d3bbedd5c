//! Command-line interface for checkin.
//!
//! This module provides the CLI structure for the `checkin` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AddCommand, ConfigCommand, HistoryCommand, QrCommand, RegisterCommand, RosterCommand,
    ScanCommand, StatusCommand,
};

/// checkin - Event attendance by QR code or roster
///
/// Scan attendee QR codes or pick names from the roster to record one
/// check-in per person per day.
#[derive(Debug, Parser)]
#[command(name = "checkin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan a QR code and register its holder
    Scan(ScanCommand),

    /// Register a name from the roster
    Register(RegisterCommand),

    /// Add a new name to the roster and register it
    Add(AddCommand),

    /// View or edit the roster
    #[command(subcommand)]
    Roster(RosterCommand),

    /// Show recent check-ins
    History(HistoryCommand),

    /// Show roster and attendance counts
    Status(StatusCommand),

    /// Generate a QR code image for every roster name
    Qr(QrCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn status_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Status(StatusCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "checkin");
    }

    #[test]
    fn test_verbosity() {
        use crate::logging::Verbosity;

        assert_eq!(status_cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(3, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(status_cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(status_cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scan() {
        let cli = Cli::try_parse_from(["checkin", "scan", "--frames", "/tmp/cam", "--yes"]).unwrap();
        match cli.command {
            Command::Scan(cmd) => {
                assert_eq!(cmd.frames, Some(PathBuf::from("/tmp/cam")));
                assert!(cmd.yes);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_register_keeps_spaces() {
        let cli = Cli::try_parse_from(["checkin", "register", "Jane Smith"]).unwrap();
        match cli.command {
            Command::Register(cmd) => assert_eq!(cmd.name, "Jane Smith"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_roster_list_filter() {
        let cli = Cli::try_parse_from(["checkin", "roster", "list", "-f", "ali", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Roster(RosterCommand::List { filter: Some(ref f), json: true }) if f == "ali"
        ));
    }

    #[test]
    fn test_parse_history_defaults() {
        let cli = Cli::try_parse_from(["checkin", "history"]).unwrap();
        match cli.command {
            Command::History(cmd) => {
                assert_eq!(cmd.limit, None);
                assert!(!cmd.today);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_qr_output() {
        let cli = Cli::try_parse_from(["checkin", "qr", "-o", "badges"]).unwrap();
        assert!(matches!(cli.command, Command::Qr(QrCommand { output: Some(_), .. })));
    }

    #[test]
    fn test_add_requires_name() {
        assert!(Cli::try_parse_from(["checkin", "add"]).is_err());
    }

    #[test]
    fn test_parse_with_config() {
        let args = vec!["checkin", "-c", "/custom/config.toml", "status"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_with_verbose() {
        let cli = Cli::try_parse_from(["checkin", "-vv", "status"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_with_quiet() {
        let cli = Cli::try_parse_from(["checkin", "-q", "status"]).unwrap();
        assert!(cli.quiet);
    }
}
