//! # genview_server
//!
//! HTTP generation endpoint for genview.
//!
//! `POST /api/generate` accepts a `GenerateRequest`, asks the configured
//! completion backend for a streamed answer and relays every delta as one
//! NDJSON record. When the finished output contains markdown fences, a final
//! record carrying the cleaned code closes the stream.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use genview_llm::LlmAdapter;
//! use genview_server::{serve, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Arc::new(LlmAdapter::from_env()?);
//!     serve(&ServerConfig::default(), backend, std::future::pending()).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cleanup;
pub mod config;
pub mod error;

use std::future::Future;
use std::sync::Arc;

use genview_llm::CompletionBackend;
use tracing::info;

pub use api::{router, AppState};
pub use cleanup::{clean_completion, contains_fence, strip_fences};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn serve(
    config: &ServerConfig,
    backend: Arc<dyn CompletionBackend>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> ServerResult<()> {
    let app = router(AppState::new(backend), config);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("Generation endpoint listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Generation endpoint shutting down");
        })
        .await?;

    Ok(())
}
