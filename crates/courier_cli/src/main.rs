//! Courier CLI
//!
//! Command-line tools for Courier queue files.
//!
//! # Commands
//!
//! - `inspect` - Display the header and space usage of a queue file
//! - `dump` - Print the queued records, oldest first
//! - `verify` - Walk the record chain and check it against the header
//! - `compact` - Slide live records to the front and truncate the file
//! - `clear` - Remove every record

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use courier_core::{Config, QueueKind};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Courier queue file tools.
#[derive(Parser)]
#[command(name = "courier")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a queue file
    #[arg(global = true, short, long, conflicts_with = "root")]
    path: Option<PathBuf>,

    /// Application data directory holding the Courier namespace
    #[arg(global = true, short, long)]
    root: Option<PathBuf>,

    /// Queue to open under --root
    #[arg(global = true, short, long, value_enum, default_value = "events")]
    queue: QueueArg,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum QueueArg {
    Events,
    Identities,
}

impl From<QueueArg> for QueueKind {
    fn from(queue: QueueArg) -> Self {
        match queue {
            QueueArg::Events => QueueKind::Events,
            QueueArg::Identities => QueueKind::Identities,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Display the header and space usage of a queue file
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print queued records, oldest first
    Dump {
        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify the record chain against the header
    Verify,

    /// Reclaim space left by removed records
    Compact {
        /// Show what would be reclaimed without rewriting the file
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Remove every record from the queue
    Clear {
        /// Required to confirm the records should be discarded
        #[arg(long)]
        yes: bool,
    },

    /// Show version information
    Version,
}

impl Cli {
    fn queue_file(&self, command: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| format!("--path or --root required for {command}"))?;
        Ok(Config::new(root).queue_path(self.queue.into()))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Inspect { format } => {
            commands::inspect::run(&cli.queue_file("inspect")?, format)?;
        }
        Commands::Dump { limit, format } => {
            commands::dump::run(&cli.queue_file("dump")?, *limit, format)?;
        }
        Commands::Verify => {
            commands::verify::run(&cli.queue_file("verify")?)?;
        }
        Commands::Compact { dry_run } => {
            commands::compact::run(&cli.queue_file("compact")?, *dry_run)?;
        }
        Commands::Clear { yes } => {
            if !yes {
                return Err("refusing to clear without --yes".into());
            }
            commands::clear::run(&cli.queue_file("clear")?)?;
        }
        Commands::Version => {
            println!("Courier CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Queue file format v{}",
                courier_storage::FORMAT_VERSION
            );
        }
    }

    Ok(())
}
