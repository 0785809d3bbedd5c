//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Scan command arguments.
#[derive(Debug, Args)]
pub struct ScanCommand {
    /// Directory to read camera frames from (overrides `scanner.frames_dir`)
    #[arg(short, long, value_name = "DIR")]
    pub frames: Option<PathBuf>,

    /// Add and register unknown codes without asking
    #[arg(short, long)]
    pub yes: bool,
}

/// Register command arguments.
#[derive(Debug, Args)]
pub struct RegisterCommand {
    /// A name from the roster
    pub name: String,
}

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// The attendee's name; added to the roster if new
    pub name: String,
}

/// Roster commands.
#[derive(Debug, Subcommand)]
pub enum RosterCommand {
    /// List roster names in display order
    List {
        /// Only show names containing this text (case-insensitive)
        #[arg(short, long)]
        filter: Option<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Add a name without registering attendance
    Add {
        /// The name to add
        name: String,
    },
}

/// History command arguments.
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Maximum number of check-ins (defaults to `display.history_limit`)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Only show today's check-ins
    #[arg(short, long)]
    pub today: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// QR generation arguments.
#[derive(Debug, Args)]
pub struct QrCommand {
    /// Directory for the images (overrides `qr.output_dir`)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Output the generation report as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_command_debug() {
        let cmd = ScanCommand {
            frames: Some(PathBuf::from("/tmp/frames")),
            yes: true,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("frames"));
        assert!(debug_str.contains("yes"));
    }

    #[test]
    fn test_roster_command_debug() {
        let cmd = RosterCommand::List {
            filter: Some("ali".to_string()),
            json: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("List"));
        assert!(debug_str.contains("ali"));
    }

    #[test]
    fn test_history_command_debug() {
        let cmd = HistoryCommand {
            limit: Some(5),
            today: true,
            json: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("limit"));
        assert!(debug_str.contains("today"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Validate { file: None };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Validate"));
    }
}
