//! sessiontx CLI
//!
//! Command-line tools for exercising the session lock and backoff.
//!
//! # Commands
//!
//! - `simulate` - Run concurrent nested chains through the priority runner
//! - `backoff` - Print a real backoff schedule

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Session lock and backoff tools.
#[derive(Parser)]
#[command(name = "sessiontx")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run concurrent chains through the task runner and report the lock timeline
    Simulate {
        /// Number of concurrent workers
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// Chains per worker
        #[arg(short, long, default_value = "3")]
        chains: usize,

        /// Nested transactions inside each chain
        #[arg(short, long, default_value = "2")]
        depth: usize,

        /// Milliseconds spent inside each chain
        #[arg(long, default_value = "10")]
        hold_ms: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the delays produced by successive waits
    Backoff {
        /// Number of waits
        #[arg(short, long, default_value = "8")]
        attempts: usize,

        /// Base unit in milliseconds
        #[arg(short, long, default_value = "10")]
        unit_ms: u64,

        /// Ceiling in units (0 = unbounded)
        #[arg(short, long, default_value = "60")]
        max_units: u32,

        /// Reset after this many waits
        #[arg(short, long)]
        reset_after: Option<usize>,
    },

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
        Commands::Simulate {
            workers,
            chains,
            depth,
            hold_ms,
            format,
        } => {
            commands::simulate::run(workers, chains, depth, hold_ms, &format)?;
        }
        Commands::Backoff {
            attempts,
            unit_ms,
            max_units,
            reset_after,
        } => {
            commands::backoff::run(attempts, unit_ms, max_units, reset_after)?;
        }
        Commands::Version => {
            println!("sessiontx CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("sessiontx core v{}", sessiontx_core::VERSION);
        }
    }

    Ok(())
}
