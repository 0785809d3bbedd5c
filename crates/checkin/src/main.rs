//! `checkin` - CLI for event check-in
//!
//! This binary provides the operator surface: scanning, manual registration,
//! roster and history views, and QR code generation.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use checkin::cli::{Cli, Command, ConfigCommand, HistoryCommand, QrCommand, RosterCommand, ScanCommand};
use checkin::ledger::TIMESTAMP_FORMAT;
use checkin::qrgen::FileStatus;
use checkin::roster::normalize_name;
use checkin::{
    init_logging, AttendanceRecord, CheckInWorkflow, Config, FrameDirectory, Ledger, Notice,
    QrDecoder, QrGenerator, Roster,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Scan(cmd) => handle_scan(&config, cmd).await,
        Command::Register(cmd) => handle_register(&config, &cmd.name),
        Command::Add(cmd) => {
            let mut workflow = open_workflow(&config, None)?;
            let notice = workflow.register_name(&cmd.name);
            report(&workflow, notice, config.display.history_limit)
        }
        Command::Roster(cmd) => handle_roster(&config, cmd),
        Command::History(cmd) => handle_history(&config, &cmd),
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Qr(cmd) => handle_qr(&config, cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_workflow(config: &Config, frames: Option<PathBuf>) -> anyhow::Result<CheckInWorkflow> {
    let roster = Roster::load(config.roster_path())?;
    let ledger = Ledger::open(config.database_path())?;
    let frames = frames.unwrap_or_else(|| config.scanner.frames_dir.clone());

    Ok(CheckInWorkflow::new(
        roster,
        ledger,
        Box::new(QrDecoder::new()),
        Box::new(FrameDirectory::new(frames)),
    ))
}

/// Print a workflow notice; failures become the process error.
fn report(workflow: &CheckInWorkflow, notice: Notice, history_limit: usize) -> anyhow::Result<()> {
    match notice {
        Notice::Failed { message, .. } => bail!("{message}"),
        Notice::CheckedIn(_) => {
            println!("{notice}");
            println!();
            print_history(&workflow.recent_check_ins(history_limit)?);
        }
        other => println!("{other}"),
    }
    Ok(())
}

async fn handle_scan(config: &Config, cmd: ScanCommand) -> anyhow::Result<()> {
    let mut workflow = open_workflow(config, cmd.frames)?;

    println!("Scanning QR code... (Ctrl-C to stop)");
    let stop = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let notice = workflow.scan_until_decoded(config.frame_interval(), stop).await;

    let notice = match notice {
        Notice::UnknownCode { .. } => {
            println!("{notice}");
            let confirmed = cmd.yes || ask("Add to the list and register attendance? [y/N] ").await?;
            if confirmed {
                workflow.confirm_pending()
            } else {
                workflow.abandon_pending()
            }
        }
        other => other,
    };

    report(&workflow, notice, config.display.history_limit)
}

async fn ask(question: &str) -> anyhow::Result<bool> {
    print!("{question}");
    std::io::stdout().flush()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn handle_register(config: &Config, name: &str) -> anyhow::Result<()> {
    let mut workflow = open_workflow(config, None)?;

    let name = normalize_name(name)?;
    if !workflow.roster().contains(name) {
        bail!("{name} is not in the list; use `checkin add` to add a new name");
    }

    let notice = workflow.register_name(name);
    report(&workflow, notice, config.display.history_limit)
}

fn handle_roster(config: &Config, cmd: RosterCommand) -> anyhow::Result<()> {
    let mut roster = Roster::load(config.roster_path())?;

    match cmd {
        RosterCommand::List { filter, json } => {
            let names = filter.map_or_else(|| roster.all(), |text| roster.filter(&text));
            if json {
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else if names.is_empty() {
                println!("No matching names.");
            } else {
                for name in names {
                    println!("{name}");
                }
            }
        }
        RosterCommand::Add { name } => {
            let name = normalize_name(&name)?.to_string();
            if roster.add(&name)? {
                println!("Added {name} to the list.");
            } else {
                println!("{name} is already in the list.");
            }
        }
    }
    Ok(())
}

fn handle_history(config: &Config, cmd: &HistoryCommand) -> anyhow::Result<()> {
    let ledger = Ledger::open(config.database_path())?;

    let records = if cmd.today {
        let mut records = ledger.history_on(ledger.today())?;
        if let Some(limit) = cmd.limit {
            records.truncate(limit);
        }
        records
    } else {
        ledger.history(Some(cmd.limit.unwrap_or(config.display.history_limit)))?
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print_history(&records);
    }
    Ok(())
}

fn print_history(records: &[AttendanceRecord]) {
    if records.is_empty() {
        println!("No registrations yet.");
        return;
    }

    println!("{:<30} Time", "Name");
    println!("{:<30} {}", "-".repeat(30), "-".repeat(19));
    for record in records {
        println!(
            "{:<30} {}",
            record.name,
            record.checked_in_at.format(TIMESTAMP_FORMAT)
        );
    }
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let roster = Roster::load(config.roster_path())?;
    let ledger = Ledger::open(config.database_path())?;
    let today = ledger.today();
    let checked_in_today = ledger.count_on(today)?;
    let total = ledger.count()?;

    if json {
        let status = serde_json::json!({
            "date": today.to_string(),
            "roster_size": roster.len(),
            "checked_in_today": checked_in_today,
            "total_check_ins": total,
            "roster_path": roster.path(),
            "database_path": ledger.path(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("checkin status");
        println!("--------------");
        println!("Date:             {today}");
        println!("Roster:           {} names", roster.len());
        println!("Checked in today: {checked_in_today}");
        println!("All check-ins:    {total}");
        println!("Roster file:      {}", roster.path().display());
        println!("Database:         {}", ledger.path().display());
    }
    Ok(())
}

fn handle_qr(config: &Config, cmd: QrCommand) -> anyhow::Result<()> {
    let roster = Roster::open_existing(config.roster_path())?;
    let output = cmd.output.unwrap_or_else(|| config.qr.output_dir.clone());
    let generator = QrGenerator::new(&output, config.qr.module_size);

    let summary = generator
        .generate_all(roster.names())
        .with_context(|| format!("generating QR codes into {}", output.display()))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    for code in &summary.generated {
        let suffix = match code.status {
            FileStatus::Written => "",
            FileStatus::Unchanged => " (unchanged)",
        };
        println!(
            "Generated QR code for {}: {}{suffix}",
            code.name,
            code.path.display()
        );
    }
    for name in &summary.skipped {
        println!("Skipped {name:?}: no usable file name characters");
    }
    for collision in &summary.collisions {
        println!(
            "Warning: {} share {}; kept the last one",
            collision.names.join(", "),
            collision.path.display()
        );
    }
    println!();
    println!(
        "Generated {} QR codes in the '{}' folder",
        summary.generated.len(),
        output.display()
    );
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Roster path:        {}", config.roster_path().display());
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Scanner]");
                println!("  Frames directory:   {}", config.scanner.frames_dir.display());
                println!("  Frame interval ms:  {}", config.scanner.frame_interval_ms);
                println!();
                println!("[QR]");
                println!("  Output directory:   {}", config.qr.output_dir.display());
                println!("  Module size (px):   {}", config.qr.module_size);
                println!();
                println!("[Display]");
                println!("  History limit:      {}", config.display.history_limit);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
