//! CLI module for the user accounts service
//!
//! - `serve`: run the HTTP server
//! - `migrate`: apply the embedded schema and exit

pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging::init_logging;

/// User accounts service
#[derive(Parser)]
#[command(name = "user-accounts")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(serve::ServeArgs),

    /// Apply database migrations and exit
    Migrate,
}

/// Load `.env`, then layered configuration, then install logging
fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_logging(&config.logging);

    Ok(config)
}
