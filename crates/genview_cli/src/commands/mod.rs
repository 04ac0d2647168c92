//! CLI command definitions.
//!
//! Each subcommand maps to one side of genview: the generation endpoint or
//! the interactive studio that talks to it.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod serve;
pub mod studio;

/// genview - prompt-to-component generator with live preview
#[derive(Parser)]
#[command(name = "genview")]
#[command(version, about = "genview - prompt-to-component generator with live preview")]
#[command(long_about = r#"
genview turns a natural-language prompt into a single-file React + TypeScript
component styled with Tailwind CSS, previews it, and repairs it when the
preview reports an error.

COMMANDS:
  serve   → Run the streaming generation endpoint (POST /api/generate)
  studio  → Interactive session: generate, fix, preview, auto-fix

CONFIGURATION:
  genview.toml in the working directory (or --config), overridden by
  OPENAI_API_KEY, ANTHROPIC_API_KEY, GENVIEW_LLM_PROVIDER, GENVIEW_LLM_MODEL,
  GENVIEW_BIND and GENVIEW_ENDPOINT.

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Configuration error
  4 - Backend error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Path to the config file (defaults to ./genview.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the generation endpoint
    Serve(serve::ServeArgs),

    /// Start an interactive generation session
    Studio(studio::StudioArgs),
}
