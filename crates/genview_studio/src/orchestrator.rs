//! Generation orchestrator.
//!
//! Owns the transcript and the code buffer. Every generation streams into a
//! fresh [`CodeAccumulator`] and each applied event is published at once, so
//! observers see the code grow. A stream that breaks off leaves whatever was
//! published in place; a stream that fails before its first event leaves the
//! previous code untouched.

use std::sync::Arc;

use futures::StreamExt;
use genview_protocol::{Applied, CodeAccumulator, GenerateRequest, Message};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use crate::artifact::CodeArtifact;
use crate::error::{StudioError, StudioResult};
use crate::session::{FixOrigin, GenerationKind, SessionState};
use crate::studio::StudioEvent;
use crate::transcript::Transcript;
use crate::transport::GenerationTransport;

/// Drives generations against a transport.
pub struct Orchestrator {
    transport: Arc<dyn GenerationTransport>,
    state: Arc<Mutex<SessionState>>,
    transcript: Mutex<Transcript>,
    artifact: watch::Sender<CodeArtifact>,
    events: Option<broadcast::Sender<StudioEvent>>,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn GenerationTransport>, state: Arc<Mutex<SessionState>>) -> Self {
        let (artifact, _) = watch::channel(CodeArtifact::default());
        Self {
            transport,
            state,
            transcript: Mutex::new(Transcript::new()),
            artifact,
            events: None,
        }
    }

    /// Announce each generation that gets past its guards on `events`.
    pub fn with_events(mut self, events: broadcast::Sender<StudioEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Subscribe to code updates.
    pub fn subscribe(&self) -> watch::Receiver<CodeArtifact> {
        self.artifact.subscribe()
    }

    /// Latest published code.
    pub fn artifact(&self) -> CodeArtifact {
        self.artifact.borrow().clone()
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.transcript.lock().messages().to_vec()
    }

    /// Start a new component from `prompt`, discarding the transcript.
    pub async fn generate(&self, prompt: &str) -> StudioResult<String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(StudioError::EmptyPrompt);
        }
        self.state.lock().begin(GenerationKind::Initial)?;

        let messages = {
            let mut transcript = self.transcript.lock();
            transcript.restart_with(Message::user(prompt));
            transcript.messages().to_vec()
        };
        self.complete(GenerationKind::Initial, GenerateRequest::initial(prompt, messages))
            .await
    }

    /// Revise the current code according to a user instruction.
    pub async fn fix(&self, instruction: &str) -> StudioResult<String> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(StudioError::EmptyInstruction);
        }
        self.state.lock().begin(GenerationKind::ManualFix)?;
        self.fix_claimed(GenerationKind::ManualFix, instruction).await
    }

    /// Run a fix for a session that the caller already claimed.
    pub(crate) async fn fix_claimed(
        &self,
        kind: GenerationKind,
        instruction: &str,
    ) -> StudioResult<String> {
        let origin = match kind {
            GenerationKind::AutoFix => FixOrigin::Auto,
            _ => FixOrigin::Manual,
        };
        self.state.lock().record_fix(instruction, origin);

        let current_code = self.artifact.borrow().code.clone();
        let messages = {
            let mut transcript = self.transcript.lock();
            transcript.push(Message::user(instruction));
            transcript.messages().to_vec()
        };
        self.complete(kind, GenerateRequest::fix(instruction, messages, current_code))
            .await
    }

    /// Drop transcript and code. The caller resets the session state.
    pub(crate) fn clear(&self) {
        self.transcript.lock().clear();
        self.artifact.send_modify(|artifact| {
            artifact.code.clear();
            artifact.complete = false;
            artifact.revision += 1;
        });
    }

    async fn complete(&self, kind: GenerationKind, request: GenerateRequest) -> StudioResult<String> {
        let revision_before = self.artifact.borrow().revision;
        info!(%kind, transcript = request.messages.len(), "Generation started");
        if let Some(events) = &self.events {
            let _ = events.send(StudioEvent::GenerationStarted { kind });
        }

        let result = self.stream(&request).await;
        let produced = self.artifact.borrow().revision != revision_before;

        match &result {
            Ok(code) => {
                self.transcript.lock().push(Message::assistant(code.clone()));
                info!(%kind, chars = code.len(), "Generation finished");
            }
            Err(e) if produced => warn!(%kind, "Generation broke off, keeping partial code: {}", e),
            Err(e) => error!(%kind, "Generation failed: {}", e),
        }

        self.state.lock().finish(kind, result.is_ok(), produced);
        result
    }

    async fn stream(&self, request: &GenerateRequest) -> StudioResult<String> {
        let mut events = self.transport.open(request).await?;
        let mut buffer = CodeAccumulator::new();

        while let Some(event) = events.next().await {
            if buffer.apply(event?) != Applied::Ignored {
                self.publish(buffer.code(), false);
            }
        }

        if !buffer.has_content() {
            return Err(StudioError::EmptyCompletion);
        }
        let code = buffer.into_code();
        self.publish(&code, true);
        Ok(code)
    }

    fn publish(&self, code: &str, complete: bool) {
        self.artifact.send_modify(|artifact| {
            artifact.code.clear();
            artifact.code.push_str(code);
            artifact.complete = complete;
            artifact.revision += 1;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ScriptedTransport, TransportScript};
    use crate::session::Phase;
    use genview_protocol::{GenerationMode, MessageRole, StreamEvent};

    fn orchestrator(transport: &ScriptedTransport) -> (Orchestrator, Arc<Mutex<SessionState>>) {
        let state = Arc::new(Mutex::new(SessionState::new(3)));
        (
            Orchestrator::new(Arc::new(transport.clone()), state.clone()),
            state,
        )
    }

    #[tokio::test]
    async fn test_unfenced_generation_concatenates_fragments() {
        let transport = ScriptedTransport::new().with_script(TransportScript::fragments([
            "import",
            " React...",
            "export default...",
        ]));
        let (orch, state) = orchestrator(&transport);

        let code = orch.generate("build a counter").await.unwrap();

        assert_eq!(code, "import React...export default...");
        assert!(orch.artifact().complete);
        assert_eq!(state.lock().phase(), Phase::AwaitingErrorCheck);

        let transcript = orch.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1], Message::assistant("import React...export default..."));
    }

    #[tokio::test]
    async fn test_cleaned_code_replaces_buffer() {
        let transport = ScriptedTransport::new().with_script(TransportScript::Events(vec![
            StreamEvent::Fragment("```tsx\n".to_string()),
            StreamEvent::Fragment("import React...".to_string()),
            StreamEvent::Fragment("\n```".to_string()),
            StreamEvent::FinalCleaned("import React...".to_string()),
            StreamEvent::Fragment("late".to_string()),
        ]));
        let (orch, _) = orchestrator(&transport);

        assert_eq!(orch.generate("x").await.unwrap(), "import React...");
    }

    #[tokio::test]
    async fn test_fix_sends_current_code_and_transcript() {
        let transport = ScriptedTransport::new()
            .with_script(TransportScript::fragments(["v1"]))
            .with_script(TransportScript::fragments(["v2"]));
        let (orch, state) = orchestrator(&transport);

        orch.generate("build a counter").await.unwrap();
        orch.fix("make it blue").await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].mode(), GenerationMode::Initial);
        assert_eq!(requests[1].mode(), GenerationMode::Fix);
        assert_eq!(requests[1].current_code.as_deref(), Some("v1"));
        assert_eq!(requests[1].messages.len(), 3);
        assert_eq!(requests[1].messages[2], Message::user("make it blue"));
        assert_eq!(orch.artifact().code, "v2");
        assert_eq!(state.lock().history().len(), 1);
    }

    #[tokio::test]
    async fn test_break_off_keeps_partial_code() {
        let transport = ScriptedTransport::new().with_script(TransportScript::FailAfter(
            vec![StreamEvent::Fragment("import Rea".to_string())],
            "connection reset".to_string(),
        ));
        let (orch, state) = orchestrator(&transport);

        let err = orch.generate("x").await.unwrap_err();
        assert!(err.is_transport());

        let artifact = orch.artifact();
        assert_eq!(artifact.code, "import Rea");
        assert!(!artifact.complete);
        assert!(state.lock().has_artifact());
        assert_eq!(state.lock().phase(), Phase::Idle);
        // No assistant turn for a failed generation.
        assert!(orch.transcript().iter().all(|m| m.role == MessageRole::User));
    }

    #[tokio::test]
    async fn test_failure_before_first_fragment_keeps_previous_code() {
        let transport = ScriptedTransport::new()
            .with_script(TransportScript::fragments(["v1"]))
            .with_script(TransportScript::Refuse {
                status: 502,
                body: "overloaded".to_string(),
            });
        let (orch, _) = orchestrator(&transport);

        orch.generate("x").await.unwrap();
        assert!(orch.fix("make it blue").await.is_err());
        assert_eq!(orch.artifact().code, "v1");
        assert!(orch.artifact().complete);
    }

    #[tokio::test]
    async fn test_empty_completion_is_a_failure() {
        let transport = ScriptedTransport::new().with_script(TransportScript::Events(vec![]));
        let (orch, state) = orchestrator(&transport);

        assert!(matches!(orch.generate("x").await, Err(StudioError::EmptyCompletion)));
        assert!(!state.lock().has_artifact());
    }

    #[tokio::test]
    async fn test_input_validation() {
        let transport = ScriptedTransport::new();
        let (orch, _) = orchestrator(&transport);

        assert!(matches!(orch.generate("   ").await, Err(StudioError::EmptyPrompt)));
        assert!(matches!(orch.fix("make it blue").await, Err(StudioError::NoArtifact)));
        assert!(matches!(orch.fix("").await, Err(StudioError::EmptyInstruction)));
        assert!(transport.requests().is_empty());
    }
}
