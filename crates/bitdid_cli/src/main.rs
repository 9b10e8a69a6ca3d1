//! Bitdid CLI
//!
//! Command-line tools for a file-backed Bitdid store.
//!
//! # Commands
//!
//! - `init` - Create the tables of every entity kind
//! - `inspect` - Display row counts per kind
//! - `dump` - Print the records of one kind as JSON lines
//! - `seed` - Insert sample market data in one transaction

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Bitdid command-line store tools.
#[derive(Parser)]
#[command(name = "bitdid")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the tables of every entity kind
    Init,

    /// Display row counts per kind
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the records of one kind as JSON lines
    Dump {
        /// Entity kind or table name (e.g. Currency, currencies)
        kind: String,
    },

    /// Insert sample categories, currencies and tags in one transaction
    Seed,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Init => {
            let path = cli.path.ok_or("Store path required for init")?;
            commands::init::run(&path)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Dump { kind } => {
            let path = cli.path.ok_or("Store path required for dump")?;
            commands::dump::run(&path, &kind)?;
        }
        Commands::Seed => {
            let path = cli.path.ok_or("Store path required for seed")?;
            commands::seed::run(&path)?;
        }
        Commands::Version => {
            println!("Bitdid CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Bitdid Core v{}", bitdid_core::VERSION);
        }
    }

    Ok(())
}
