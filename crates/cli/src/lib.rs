pub mod commands;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "tallyline",
    about = "Tallyline operator CLI",
    long_about = "Turn a pasted daily sales report into reconciled orders, and manage the order database.",
    after_help = "Examples:\n  tallyline parse --input report.txt\n  pbpaste | tallyline commit --input - --date 2025-03-14\n  tallyline parse --input report.txt > reviewed.json && tallyline commit --drafts reviewed.json\n  tallyline config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Parse a daily report and print the reconciled order drafts")]
    Parse {
        #[arg(long, help = "Report file to read, or `-` for stdin")]
        input: PathBuf,
        #[arg(long, help = "Order date (YYYY-MM-DD), defaults to today")]
        date: Option<NaiveDate>,
    },
    #[command(
        about = "Commit order drafts to the database, from a report or from reviewed drafts"
    )]
    Commit {
        #[arg(
            long,
            required_unless_present = "drafts",
            conflicts_with = "drafts",
            help = "Report file to read, or `-` for stdin"
        )]
        input: Option<PathBuf>,
        #[arg(
            long,
            help = "Reviewed drafts as JSON: the saved `parse` output or a bare array of drafts"
        )]
        drafts: Option<PathBuf>,
        #[arg(
            long,
            conflicts_with = "drafts",
            help = "Order date (YYYY-MM-DD), defaults to today"
        )]
        date: Option<NaiveDate>,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the default product catalog and verify it")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Parse { input, date } => {
            commands::parse::run(&input, date.unwrap_or_else(commands::today))
        }
        Command::Commit { drafts: Some(drafts), .. } => commands::commit::run_reviewed(&drafts),
        Command::Commit { input: Some(input), date, .. } => {
            commands::commit::run(&input, date.unwrap_or_else(commands::today))
        }
        Command::Commit { input: None, drafts: None, .. } => commands::CommandResult::failure(
            "commit",
            "input",
            "either --input or --drafts is required",
            7,
        ),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
