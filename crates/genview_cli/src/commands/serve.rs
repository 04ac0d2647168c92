//! Serve command - Run the generation endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use genview_llm::{LlmAdapter, LlmProvider};
use tracing::info;

use crate::config::GenviewConfig;

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// LLM provider (openai, anthropic)
    #[arg(long)]
    provider: Option<LlmProvider>,

    /// Model to use instead of the provider default
    #[arg(short, long)]
    model: Option<String>,

    /// Do not answer cross-origin requests
    #[arg(long)]
    no_cors: bool,
}

pub async fn execute(args: ServeArgs, config: GenviewConfig) -> Result<()> {
    let mut server = config.server;
    if let Some(bind) = args.bind {
        server = server.bind(bind);
    }
    if args.no_cors {
        server = server.cors(false);
    }
    if let Some(provider) = args.provider {
        server.llm = server.llm.provider(provider);
    }
    if let Some(model) = args.model {
        server.llm = server.llm.model(model);
    }

    let adapter = LlmAdapter::from_config(&server.llm).context("Cannot set up the LLM backend")?;
    info!("Using {} model {}", adapter.provider(), adapter.model());

    println!("🚀 genview endpoint on http://{}/api/generate", server.bind);
    println!("   Press Ctrl+C to stop");

    genview_server::serve(&server, Arc::new(adapter), async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
    .context("Generation endpoint failed")?;

    println!("👋 Stopped");
    Ok(())
}
