use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};

#[derive(Debug, Parser)]
#[command(
    name = "aircheck",
    version,
    about = "Watch a folder of off-air radio captures, recognize the songs inside, tag and file them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan the intake folder and process new recordings.
    Watch {
        /// Run a single cycle and exit.
        #[arg(long)]
        once: bool,
        /// Keep polling on the configured interval.
        #[arg(long)]
        daemon: bool,
    },
    /// Run the recognition pipeline on a single file.
    Process {
        /// The recording to process.
        file: PathBuf,
    },
    /// Show directory, ledger, and configuration status.
    Status,
}

fn print_report(report: &CommandReport) {
    for detail in &report.details {
        println!("{detail}");
    }
    for issue in &report.issues {
        eprintln!("issue: {issue}");
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match cli.command {
        Commands::Watch { once, daemon } => {
            commands::watch::run(&commands::watch::WatchOptions { once, daemon })?
        }
        Commands::Process { file } => commands::process::run(&file)?,
        Commands::Status => commands::status::run()?,
    };

    print_report(&report);
    if !report.ok {
        anyhow::bail!("{} reported issues", report.command);
    }
    Ok(())
}
