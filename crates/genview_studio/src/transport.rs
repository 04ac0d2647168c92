//! Client side of the generation endpoint.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use genview_protocol::{decode_events, GenerateRequest, StreamEvent, StreamResult};
use tracing::{debug, warn};

use crate::error::{StudioError, StudioResult};

/// Events of one generation in arrival order.
pub type EventStream = BoxStream<'static, StreamResult<StreamEvent>>;

/// Opens generation streams.
#[async_trait]
pub trait GenerationTransport: Send + Sync {
    /// Send `request` and return its event stream. Errors returned here
    /// happen before any event; errors inside the stream end it early.
    async fn open(&self, request: &GenerateRequest) -> StudioResult<EventStream>;
}

/// Transport over HTTP with a chunked NDJSON response.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationTransport for HttpTransport {
    async fn open(&self, request: &GenerateRequest) -> StudioResult<EventStream> {
        debug!(endpoint = %self.endpoint, mode = %request.mode(), "Opening generation stream");

        let response = self.client.post(&self.endpoint).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Generation endpoint refused request: {} {}", status, body);
            return Err(StudioError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(decode_events(response.bytes_stream()).boxed())
    }
}
