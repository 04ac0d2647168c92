//! Scripted collaborators for testing without a generation endpoint or a
//! real preview sandbox.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use genview_protocol::{GenerateRequest, StreamError, StreamEvent};
use parking_lot::RwLock;
use tokio::sync::Semaphore;

use crate::detect::DetectedError;
use crate::error::{StudioError, StudioResult};
use crate::preview::{PreviewBundle, PreviewSandbox};
use crate::transport::{EventStream, GenerationTransport};
use crate::watcher::ErrorSource;

/// How one scripted generation plays out.
#[derive(Debug, Clone)]
pub enum TransportScript {
    /// Deliver the events, then end cleanly
    Events(Vec<StreamEvent>),
    /// Deliver the events, then break the transport
    FailAfter(Vec<StreamEvent>, String),
    /// Refuse before streaming
    Refuse { status: u16, body: String },
}

impl TransportScript {
    /// Fragments only, ending cleanly.
    pub fn fragments<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TransportScript::Events(
            parts
                .into_iter()
                .map(|p| StreamEvent::Fragment(p.into()))
                .collect(),
        )
    }
}

/// Transport that replays scripts in order. The last script repeats once
/// the queue is down to one entry.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    scripts: Arc<RwLock<VecDeque<TransportScript>>>,
    requests: Arc<RwLock<Vec<GenerateRequest>>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script.
    pub fn with_script(self, script: TransportScript) -> Self {
        self.scripts.write().push_back(script);
        self
    }

    /// Hold every `open` until a permit is added to `gate`.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.read().clone()
    }

    fn next_script(&self) -> TransportScript {
        let mut scripts = self.scripts.write();
        if scripts.len() > 1 {
            scripts.pop_front().unwrap_or_else(|| TransportScript::Events(Vec::new()))
        } else {
            scripts
                .front()
                .cloned()
                .unwrap_or_else(|| TransportScript::Events(Vec::new()))
        }
    }
}

#[async_trait]
impl GenerationTransport for ScriptedTransport {
    async fn open(&self, request: &GenerateRequest) -> StudioResult<EventStream> {
        self.requests.write().push(request.clone());

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        match self.next_script() {
            TransportScript::Events(events) => Ok(stream::iter(events.into_iter().map(Ok)).boxed()),
            TransportScript::FailAfter(events, message) => {
                let items = events
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(StreamError::Transport(message))));
                Ok(stream::iter(items).boxed())
            }
            TransportScript::Refuse { status, body } => Err(StudioError::Status { status, body }),
        }
    }
}

/// Error source that replays observations in order; the last one repeats.
#[derive(Clone, Default)]
pub struct ScriptedErrorSource {
    observations: Arc<RwLock<VecDeque<Option<DetectedError>>>>,
    inspections: Arc<RwLock<usize>>,
    resets: Arc<RwLock<usize>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedErrorSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an observation. `None` means the preview is clean.
    pub fn then(self, observation: Option<DetectedError>) -> Self {
        self.observations.write().push_back(observation);
        self
    }

    /// Hold every `inspect` until a permit is added to `gate`. The
    /// inspection is counted before it waits.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn inspections(&self) -> usize {
        *self.inspections.read()
    }

    pub fn resets(&self) -> usize {
        *self.resets.read()
    }
}

#[async_trait]
impl ErrorSource for ScriptedErrorSource {
    async fn inspect(&self) -> StudioResult<Option<DetectedError>> {
        *self.inspections.write() += 1;

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let mut queue = self.observations.write();
        let next = if queue.len() > 1 {
            queue.pop_front().flatten()
        } else {
            queue.front().cloned().flatten()
        };
        Ok(next)
    }

    fn reset(&self) {
        *self.resets.write() += 1;
    }
}

/// Preview that records every bundle it is asked to load.
#[derive(Clone, Default)]
pub struct RecordingPreview {
    loaded: Arc<RwLock<Vec<PreviewBundle>>>,
}

impl RecordingPreview {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded(&self) -> Vec<PreviewBundle> {
        self.loaded.read().clone()
    }

    pub fn last_app_source(&self) -> Option<String> {
        self.loaded.read().last().map(|b| b.app_source().to_string())
    }
}

#[async_trait]
impl PreviewSandbox for RecordingPreview {
    async fn load(&self, bundle: &PreviewBundle) -> StudioResult<()> {
        self.loaded.write().push(bundle.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripts_replay_in_order_and_last_repeats() {
        let transport = ScriptedTransport::new()
            .with_script(TransportScript::fragments(["a"]))
            .with_script(TransportScript::fragments(["b"]));
        let request = GenerateRequest::initial("x", vec![]);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let events: Vec<_> = transport.open(&request).await.unwrap().collect().await;
            seen.push(events);
        }

        assert_eq!(seen[0], vec![Ok(StreamEvent::Fragment("a".to_string()))]);
        assert_eq!(seen[1], vec![Ok(StreamEvent::Fragment("b".to_string()))]);
        assert_eq!(seen[2], seen[1]);
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_error_source_replay() {
        let source = ScriptedErrorSource::new()
            .then(Some(DetectedError::reported("A")))
            .then(None);

        assert_eq!(source.inspect().await.unwrap(), Some(DetectedError::reported("A")));
        assert_eq!(source.inspect().await.unwrap(), None);
        assert_eq!(source.inspect().await.unwrap(), None);
        assert_eq!(source.inspections(), 3);
    }
}
