//! CLI interface for quote-sync
//!
//! Provides subcommands for:
//! - `run`: Poll the watchlist until Ctrl-C
//! - `session`: Show the market session
//! - `status`: Show persisted symbols, holdings and alerts
//! - `config`: Show the effective configuration

mod run;
mod session;
mod status;

pub use run::RunArgs;
pub use session::SessionArgs;
pub use status::show_status;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "quote-sync")]
#[command(about = "Real-time quote synchronization with price alerts")]
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
    /// Poll the watchlist and print updates
    Run(RunArgs),
    /// Show the market session
    Session(SessionArgs),
    /// Show persisted state
    Status,
    /// Show configuration
    Config,
}
