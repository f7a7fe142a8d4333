//! CLI interface for poly-lock
//!
//! Provides subcommands for:
//! - `run`: Start paper trading
//! - `status`: Show the last persisted snapshot
//! - `config`: Show the effective configuration

mod run;
mod status;

pub use run::RunArgs;
pub use status::print_status;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "poly-lock")]
#[command(about = "Dual-profit lock paper trader for Polymarket 15-minute crypto markets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start paper trading
    Run(RunArgs),
    /// Show the last persisted snapshot
    Status,
    /// Show the effective configuration
    Config,
}
