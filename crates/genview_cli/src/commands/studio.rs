//! Studio command - Interactive generation session.
//!
//! Lines typed at the prompt are sent as a new prompt while no code exists
//! and as a fix instruction afterwards. The preview files are written to a
//! directory for a dev server to render; the error watcher reads the DOM
//! snapshot that the dev server drops next to them, and `/error` lets the
//! user report an error seen in the browser directly.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use genview_studio::{
    ChannelErrorSource, DiagnosticSender, DirectoryPreview, DomErrorSource, FallbackErrorSource,
    FixOrigin, HttpTransport, SnapshotFile, Studio, StudioError, StudioEvent,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;

use crate::config::GenviewConfig;

/// File name of the DOM snapshot inside the preview directory.
const SNAPSHOT_FILE: &str = ".dom-snapshot.html";

#[derive(Args)]
pub struct StudioArgs {
    /// Generation endpoint URL
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Directory the preview files are written to
    #[arg(short, long, default_value = ".genview/preview")]
    preview_dir: PathBuf,

    /// DOM snapshot to scan for errors (defaults to <preview-dir>/.dom-snapshot.html)
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Prompt to start with
    #[arg(long)]
    prompt: Option<String>,
}

pub async fn execute(args: StudioArgs, config: GenviewConfig) -> Result<()> {
    let mut studio_config = config.studio;
    if let Some(endpoint) = args.endpoint {
        studio_config = studio_config.endpoint(endpoint);
    }

    let snapshot = args
        .snapshot
        .unwrap_or_else(|| args.preview_dir.join(SNAPSHOT_FILE));
    let (diagnostics, reported) = ChannelErrorSource::channel();
    let source = FallbackErrorSource::new(
        Arc::new(reported),
        Arc::new(DomErrorSource::new(SnapshotFile::new(&snapshot))),
    );

    let studio = Studio::new(
        studio_config.clone(),
        Arc::new(HttpTransport::new(&studio_config.endpoint)),
        Arc::new(DirectoryPreview::new(&args.preview_dir)),
        Arc::new(source),
    );
    let scheduler = studio.start()?;
    let printer = tokio::spawn(print_events(studio.subscribe()));

    println!("🎨 genview studio");
    println!("   Endpoint: {}", studio_config.endpoint);
    println!("   Preview:  {}", args.preview_dir.display());
    println!("   Type a prompt to start, /help for commands");
    println!();

    if let Some(prompt) = args.prompt {
        run_line(&studio, &diagnostics, &prompt).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        show_prompt(&studio).await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if !run_line(&studio, &diagnostics, &line).await {
            break;
        }
    }

    scheduler.abort();
    printer.abort();
    println!("👋 Bye");
    Ok(())
}

async fn show_prompt(studio: &Studio) -> Result<()> {
    let status = studio.auto_fix_status();
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(format!("[auto-fix {}] > ", status).as_bytes())
        .await?;
    stdout.flush().await?;
    Ok(())
}

/// Handle one input line. Returns false when the session should end.
async fn run_line(studio: &Studio, diagnostics: &DiagnosticSender, line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return true;
    }

    let (command, rest) = match line.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "/quit" | "/exit" => return false,
        "/help" => print_help(),
        "/restart" => match studio.restart() {
            Ok(()) => println!("🔄 Session cleared"),
            Err(e) => println!("⏳ {}", e),
        },
        "/history" => print_history(studio),
        "/status" => {
            println!("   Phase: {}", studio.phase());
            println!("   Auto-fix attempts: {}", studio.auto_fix_status());
            if let Some(error) = studio.active_error() {
                println!("   Active error: {}", error.message());
            }
        }
        "/code" => match studio.current_code() {
            Some(code) => println!("{}", code),
            None => println!("   No code yet"),
        },
        "/new" => report(studio.generate(rest).await),
        "/error" => {
            diagnostics.report_error(rest);
            println!("   Error noted, it will be picked up by the next check");
        }
        "/clean" => {
            diagnostics.report_clean();
        }
        _ if line.starts_with('/') => println!("   Unknown command {}, try /help", command),
        _ if studio.current_code().is_none() => report(studio.generate(line).await),
        _ => report(studio.fix(line).await),
    }
    true
}

fn report(result: Result<String, StudioError>) {
    match result {
        Ok(_) => {}
        Err(StudioError::Busy) => println!("⏳ A generation is running, try again when it finishes"),
        Err(e) if e.is_rejection() => println!("⚠️  {}", e),
        // Failures are printed by the event printer.
        Err(_) => {}
    }
}

fn print_help() {
    println!("   <text>          New prompt, or fix instruction once code exists");
    println!("   /new <prompt>   Start over with a new prompt");
    println!("   /error <text>   Report an error shown in the preview");
    println!("   /clean          Report that the preview renders fine");
    println!("   /status         Show phase, attempts and active error");
    println!("   /code           Print the current code");
    println!("   /history        List fix instructions");
    println!("   /restart        Clear the session");
    println!("   /quit           Leave");
}

fn print_history(studio: &Studio) {
    let history = studio.history();
    if history.is_empty() {
        println!("   No fixes yet");
        return;
    }
    for (i, record) in history.iter().enumerate() {
        let origin = match record.origin {
            FixOrigin::Manual => "you",
            FixOrigin::Auto => "auto",
        };
        println!(
            "   {}. [{}] {} ({})",
            i + 1,
            origin,
            record.instruction,
            record.requested_at.format("%H:%M:%S")
        );
    }
}

async fn print_events(mut events: broadcast::Receiver<StudioEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            StudioEvent::GenerationStarted { kind } => println!("\n✍️  Generating ({})...", kind),
            StudioEvent::GenerationFinished { chars, .. } => {
                println!("✅ Preview updated ({} chars)", chars)
            }
            StudioEvent::GenerationFailed { message, .. } => println!("❌ {}", message),
            StudioEvent::ErrorDetected { message } => println!("\n🐞 Preview error: {}", message),
            StudioEvent::AutoFixDispatched {
                attempt,
                max_attempts,
                ..
            } => println!("🔧 Auto-fix attempt {}/{}", attempt, max_attempts),
            StudioEvent::AutoFixExhausted { attempts } => println!(
                "⚠️  Auto-fix gave up after {} attempts, describe a fix to continue",
                attempts
            ),
            StudioEvent::SessionReset => {}
        }
    }
}
