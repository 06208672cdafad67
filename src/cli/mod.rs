//! CLI module
//!
//! Command-line interface for running the pipeline.
//!
//! # Commands
//!
//! - `run` - Extract, validate and load entity kinds
//! - `check` - Validate the config and show the dependency order
//! - `schemas` - Show compiled entity schemas

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
