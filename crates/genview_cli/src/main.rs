//! genview CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Configuration error
//! - 4: Backend error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;

use commands::{Cli, Commands};
use config::GenviewConfig;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CONFIG_ERROR: u8 = 3;
    pub const BACKEND_ERROR: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match GenviewConfig::load(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Serve(args) => commands::serve::execute(args, config).await,
            Commands::Studio(args) => commands::studio::execute(args, config).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("genview={},warn", level)));

    // Logs go to stderr so they do not interleave with the studio prompt.
    let (plain, json) = if cli.json_logs {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (
            Some(fmt::layer().with_target(false).with_writer(std::io::stderr)),
            None,
        )
    };

    // Already initialized is fine.
    let _ = tracing_subscriber::registry()
        .with(plain)
        .with(json)
        .with(filter)
        .try_init();
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let msg = format!("{:#}", e).to_lowercase();

    if msg.contains("llm") || msg.contains("api key") || msg.contains("endpoint") {
        ExitCodes::BACKEND_ERROR
    } else if msg.contains("config") || msg.contains("toml") {
        ExitCodes::CONFIG_ERROR
    } else if msg.contains("argument") || msg.contains("must not be empty") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
