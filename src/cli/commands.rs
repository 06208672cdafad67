//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Retail ETL pipeline
#[derive(Parser, Debug)]
#[command(name = "retail-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline configuration file (YAML)
    #[arg(short, long, global = true, default_value = "pipeline.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract, validate and load entity kinds
    Run {
        /// Entity kinds to run (comma-separated, empty = every configured one)
        #[arg(long)]
        entities: Option<String>,

        /// Write the run summary (JSON) to this file
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Validate and quarantine, but discard accepted records
        #[arg(long)]
        dry_run: bool,
    },

    /// Load config and schemas, then show the dependency order
    Check,

    /// Show compiled entity schemas
    Schemas {
        /// Entity kind (all when omitted)
        entity: Option<String>,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Pretty,
}
