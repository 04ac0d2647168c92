//! The studio facade.
//!
//! Ties the orchestrator, the preview, the error watcher and the auto-fix
//! controller together. Error checks run on one scheduler task: a one-shot
//! check after each successful generation plus a recurring poll.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::artifact::CodeArtifact;
use crate::autofix::{AutoFixController, AutoFixDecision};
use crate::config::StudioConfig;
use crate::error::{StudioError, StudioResult};
use crate::orchestrator::Orchestrator;
use crate::preview::{PreviewBundle, PreviewSandbox};
use crate::session::{
    AutoFixStatus, ErrorObservation, FixRecord, GenerationKind, Phase, SessionState, SkipReason,
};
use crate::transport::GenerationTransport;
use crate::watcher::{ErrorSource, ErrorWatcher};

const EVENT_CAPACITY: usize = 64;

/// Notifications for the display layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StudioEvent {
    GenerationStarted { kind: GenerationKind },
    GenerationFinished { kind: GenerationKind, chars: usize },
    GenerationFailed { kind: GenerationKind, message: String },
    ErrorDetected { message: String },
    AutoFixDispatched { attempt: u32, max_attempts: u32, instruction: String },
    AutoFixExhausted { attempts: u32 },
    SessionReset,
}

/// Result of one error check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The session was not in a checkable state
    Skipped,
    /// The preview shows no error
    Clean,
    /// An error was seen but not acted on
    Ignored(SkipReason),
    /// An auto-fix ran to completion
    Fixed { attempt: u32 },
    /// An auto-fix was dispatched but its generation failed
    FixFailed { attempt: u32 },
}

struct StudioInner {
    config: StudioConfig,
    state: Arc<Mutex<SessionState>>,
    orchestrator: Orchestrator,
    watcher: ErrorWatcher,
    controller: AutoFixController,
    preview: Arc<dyn PreviewSandbox>,
    events: broadcast::Sender<StudioEvent>,
    checks: mpsc::UnboundedSender<Duration>,
    pending_checks: Mutex<Option<mpsc::UnboundedReceiver<Duration>>>,
}

/// Handle to a studio session. Cheap to clone.
#[derive(Clone)]
pub struct Studio {
    inner: Arc<StudioInner>,
}

impl Studio {
    pub fn new(
        config: StudioConfig,
        transport: Arc<dyn GenerationTransport>,
        preview: Arc<dyn PreviewSandbox>,
        source: Arc<dyn ErrorSource>,
    ) -> Self {
        let state = Arc::new(Mutex::new(SessionState::new(config.max_auto_fix_attempts)));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (checks, pending) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(StudioInner {
                orchestrator: Orchestrator::new(transport, state.clone()).with_events(events.clone()),
                watcher: ErrorWatcher::new(source),
                controller: AutoFixController::default(),
                config,
                state,
                preview,
                events,
                checks,
                pending_checks: Mutex::new(Some(pending)),
            }),
        }
    }

    pub fn config(&self) -> &StudioConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.inner.events.subscribe()
    }

    /// Observe the code buffer as it grows.
    pub fn watch_code(&self) -> watch::Receiver<CodeArtifact> {
        self.inner.orchestrator.subscribe()
    }

    pub fn current_code(&self) -> Option<String> {
        let artifact = self.inner.orchestrator.artifact();
        (!artifact.is_empty()).then_some(artifact.code)
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.lock().phase()
    }

    pub fn auto_fix_status(&self) -> AutoFixStatus {
        self.inner.state.lock().auto_fix_status()
    }

    /// Error currently shown to the user.
    pub fn active_error(&self) -> Option<ErrorObservation> {
        self.inner.state.lock().active_error().cloned()
    }

    pub fn history(&self) -> Vec<FixRecord> {
        self.inner.state.lock().history().to_vec()
    }

    pub fn transcript(&self) -> Vec<genview_protocol::Message> {
        self.inner.orchestrator.transcript()
    }

    /// Generate a new component from `prompt`.
    pub async fn generate(&self, prompt: &str) -> StudioResult<String> {
        let result = self.inner.orchestrator.generate(prompt).await;
        self.after_generation(GenerationKind::Initial, result).await
    }

    /// Apply a user fix instruction to the current code.
    pub async fn fix(&self, instruction: &str) -> StudioResult<String> {
        let result = self.inner.orchestrator.fix(instruction).await;
        self.after_generation(GenerationKind::ManualFix, result).await
    }

    /// Clear the session. Refused while a generation is streaming.
    pub fn restart(&self) -> StudioResult<()> {
        self.inner.state.lock().restart()?;
        self.inner.orchestrator.clear();
        self.inner.watcher.reset();
        info!("Session restarted");
        self.emit(StudioEvent::SessionReset);
        Ok(())
    }

    /// Run one error check and, if warranted, one auto-fix.
    pub async fn check_for_errors(&self) -> CheckOutcome {
        let inspected = {
            let state = self.inner.state.lock();
            if !state.can_inspect() {
                return CheckOutcome::Skipped;
            }
            state.generation()
        };

        let Some(found) = self.inner.watcher.check().await else {
            self.inner.state.lock().mark_checked(inspected);
            return CheckOutcome::Clean;
        };

        let decision = {
            let mut state = self.inner.state.lock();
            let decision = self
                .inner
                .controller
                .evaluate(&mut state, found.clone(), inspected);
            if !matches!(decision, AutoFixDecision::Dispatch { .. }) {
                state.mark_checked(inspected);
            }
            decision
        };

        let (attempt, instruction) = match decision {
            AutoFixDecision::Dispatch {
                attempt,
                instruction,
            } => (attempt, instruction),
            AutoFixDecision::Skip(reason) => return CheckOutcome::Ignored(reason),
        };

        self.emit(StudioEvent::ErrorDetected {
            message: found.message,
        });
        self.emit(StudioEvent::AutoFixDispatched {
            attempt,
            max_attempts: self.inner.config.max_auto_fix_attempts,
            instruction: instruction.clone(),
        });

        let result = self
            .inner
            .orchestrator
            .fix_claimed(GenerationKind::AutoFix, &instruction)
            .await;
        let outcome = match self.after_generation(GenerationKind::AutoFix, result).await {
            Ok(_) => CheckOutcome::Fixed { attempt },
            Err(_) => CheckOutcome::FixFailed { attempt },
        };

        let status = self.auto_fix_status();
        if status.is_exhausted() {
            warn!("Auto-fix budget of {} attempts used up", status.max_attempts);
            self.emit(StudioEvent::AutoFixExhausted {
                attempts: status.attempts,
            });
        }
        outcome
    }

    /// Start the scheduler task that runs delayed and periodic checks.
    /// Can be called once per studio. The task ends once every handle to
    /// the studio is dropped.
    pub fn start(&self) -> StudioResult<JoinHandle<()>> {
        let requests = self
            .inner
            .pending_checks
            .lock()
            .take()
            .ok_or(StudioError::AlreadyStarted)?;
        Ok(tokio::spawn(run_scheduler(Arc::downgrade(&self.inner), requests)))
    }

    async fn after_generation(
        &self,
        kind: GenerationKind,
        result: StudioResult<String>,
    ) -> StudioResult<String> {
        match &result {
            Ok(code) => {
                self.inner.watcher.reset();
                let bundle = PreviewBundle::for_artifact(code.as_str());
                if let Err(e) = self.inner.preview.load(&bundle).await {
                    warn!("Failed to load preview: {}", e);
                }
                self.emit(StudioEvent::GenerationFinished {
                    kind,
                    chars: code.len(),
                });
                self.request_check(self.inner.config.settle_delay_duration());
            }
            Err(e) if e.is_rejection() => {}
            Err(e) => {
                let artifact = self.inner.orchestrator.artifact();
                if !artifact.complete && !artifact.is_empty() {
                    let bundle = PreviewBundle::for_artifact(artifact.code);
                    if let Err(load_err) = self.inner.preview.load(&bundle).await {
                        warn!("Failed to load partial preview: {}", load_err);
                    }
                }
                self.emit(StudioEvent::GenerationFailed {
                    kind,
                    message: e.to_string(),
                });
            }
        }
        result
    }

    fn request_check(&self, delay: Duration) {
        if self.inner.pending_checks.lock().is_some() {
            debug!("Scheduler not started, no delayed check");
            return;
        }
        if self.inner.checks.send(delay).is_err() {
            debug!("Scheduler gone, dropping check request");
        }
    }

    fn emit(&self, event: StudioEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

async fn run_scheduler(inner: Weak<StudioInner>, mut requests: mpsc::UnboundedReceiver<Duration>) {
    let Some(poll) = inner.upgrade().map(|inner| inner.config.poll_interval_duration()) else {
        return;
    };
    let mut ticker = time::interval_at(Instant::now() + poll, poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut settle_at: Option<Instant> = None;

    debug!(?poll, "Error check scheduler started");
    loop {
        let settle = async {
            match settle_at {
                Some(deadline) => time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        let due = tokio::select! {
            _ = ticker.tick() => true,
            _ = settle => {
                settle_at = None;
                true
            }
            request = requests.recv() => match request {
                Some(delay) => {
                    settle_at = Some(Instant::now() + delay);
                    false
                }
                None => break,
            },
        };

        if due {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            Studio { inner }.check_for_errors().await;
        }
    }
    debug!("Error check scheduler stopped");
}
