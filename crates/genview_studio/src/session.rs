//! Session state of the generation and auto-fix loop.
//!
//! Each method either checks a guard and applies the matching mutation in
//! the same call, or only reads. Callers hold the surrounding mutex for the
//! duration of one call and never across an await point.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::detect::DetectedError;
use crate::error::{StudioError, StudioResult};

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing in flight
    Idle,
    /// An initial or manual-fix generation is streaming
    Generating,
    /// A generation finished and its first error check is pending
    AwaitingErrorCheck,
    /// An automatic fix is streaming
    AutoFixing,
    /// The automatic fix budget is spent
    Exhausted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Generating => "generating",
            Phase::AwaitingErrorCheck => "awaiting error check",
            Phase::AutoFixing => "auto-fixing",
            Phase::Exhausted => "exhausted",
        };
        write!(f, "{}", name)
    }
}

/// What kind of generation is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    Initial,
    ManualFix,
    AutoFix,
}

impl GenerationKind {
    pub fn is_fix(&self) -> bool {
        !matches!(self, GenerationKind::Initial)
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationKind::Initial => write!(f, "initial"),
            GenerationKind::ManualFix => write!(f, "manual fix"),
            GenerationKind::AutoFix => write!(f, "auto-fix"),
        }
    }
}

/// Who asked for a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixOrigin {
    Manual,
    Auto,
}

/// One entry of the fix history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixRecord {
    pub instruction: String,
    pub origin: FixOrigin,
    pub requested_at: DateTime<Utc>,
}

/// An error the watcher saw, stamped with when it was first seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObservation {
    pub error: DetectedError,
    pub first_seen_at: DateTime<Utc>,
}

impl ErrorObservation {
    pub fn new(error: DetectedError) -> Self {
        Self {
            error,
            first_seen_at: Utc::now(),
        }
    }

    pub fn message(&self) -> &str {
        &self.error.message
    }
}

/// Why an observed error did not lead to an automatic fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A generation or fix is in flight
    Busy,
    /// The attempt budget is spent
    Exhausted,
    /// No code exists to fix
    NoArtifact,
    /// Same message as the previously handled error
    Duplicate,
    /// The error was read from code that has since been replaced
    Stale,
}

/// Attempt counter as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AutoFixStatus {
    pub attempts: u32,
    pub max_attempts: u32,
    pub in_progress: bool,
}

impl AutoFixStatus {
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

impl fmt::Display for AutoFixStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.attempts, self.max_attempts)
    }
}

/// Mutable state shared by the orchestrator, the watcher and the user surface.
#[derive(Debug, Clone)]
pub struct SessionState {
    phase: Phase,
    attempts: u32,
    max_attempts: u32,
    has_artifact: bool,
    /// Bumped whenever a generation starts; ties an inspection to the code it saw
    generation: u64,
    /// Last error that was acted on; kept across fixes for de-duplication
    last_error: Option<ErrorObservation>,
    /// Error currently shown to the user; cleared by a successful fix
    active_error: Option<ErrorObservation>,
    history: Vec<FixRecord>,
}

impl SessionState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            phase: Phase::Idle,
            attempts: 0,
            max_attempts,
            has_artifact: false,
            generation: 0,
            last_error: None,
            active_error: None,
            history: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether a generation of any kind is streaming.
    pub fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::Generating | Phase::AutoFixing)
    }

    pub fn has_artifact(&self) -> bool {
        self.has_artifact
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn last_error(&self) -> Option<&ErrorObservation> {
        self.last_error.as_ref()
    }

    pub fn active_error(&self) -> Option<&ErrorObservation> {
        self.active_error.as_ref()
    }

    pub fn history(&self) -> &[FixRecord] {
        &self.history
    }

    pub fn auto_fix_status(&self) -> AutoFixStatus {
        AutoFixStatus {
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            in_progress: self.phase == Phase::AutoFixing,
        }
    }

    /// Whether an error check may run now.
    pub fn can_inspect(&self) -> bool {
        matches!(self.phase, Phase::Idle | Phase::AwaitingErrorCheck)
            && self.has_artifact
            && !self.is_exhausted()
    }

    /// Claim the session for a user-initiated generation.
    pub fn begin(&mut self, kind: GenerationKind) -> StudioResult<()> {
        if self.is_busy() {
            return Err(StudioError::Busy);
        }
        if kind.is_fix() && !self.has_artifact {
            return Err(StudioError::NoArtifact);
        }
        debug!(%kind, from = %self.phase, "Generation claimed");
        self.generation += 1;
        self.phase = Phase::Generating;
        Ok(())
    }

    /// Check every auto-fix guard and, if they all pass, record the error
    /// and claim the session for the fix. Returns the attempt number.
    ///
    /// `inspected` is the [`generation`](Self::generation) the error was read
    /// under; an error seen on code that was replaced since is dropped.
    pub fn claim_auto_fix(&mut self, error: DetectedError, inspected: u64) -> Result<u32, SkipReason> {
        if self.is_busy() {
            return Err(SkipReason::Busy);
        }
        if inspected != self.generation {
            return Err(SkipReason::Stale);
        }
        if self.is_exhausted() {
            return Err(SkipReason::Exhausted);
        }
        if !self.has_artifact {
            return Err(SkipReason::NoArtifact);
        }
        if self
            .last_error
            .as_ref()
            .is_some_and(|last| last.error.message == error.message)
        {
            return Err(SkipReason::Duplicate);
        }

        let observation = ErrorObservation::new(error);
        self.last_error = Some(observation.clone());
        self.active_error = Some(observation);
        self.attempts += 1;
        self.generation += 1;
        self.phase = Phase::AutoFixing;
        Ok(self.attempts)
    }

    /// Append a fix instruction to the history.
    pub fn record_fix(&mut self, instruction: impl Into<String>, origin: FixOrigin) {
        self.history.push(FixRecord {
            instruction: instruction.into(),
            origin,
            requested_at: Utc::now(),
        });
    }

    /// Release the session after a generation ended.
    ///
    /// `produced` tells whether any code reached the buffer, which is the
    /// case for partial output of a failed generation as well.
    pub fn finish(&mut self, kind: GenerationKind, succeeded: bool, produced: bool) {
        if produced {
            self.has_artifact = true;
        }
        if succeeded && kind.is_fix() {
            self.active_error = None;
        }
        if succeeded && kind == GenerationKind::ManualFix && self.attempts > 0 {
            info!("Manual fix succeeded, auto-fix attempts reset");
            self.attempts = 0;
        }

        self.phase = if self.is_exhausted() {
            Phase::Exhausted
        } else if succeeded && self.has_artifact {
            Phase::AwaitingErrorCheck
        } else {
            Phase::Idle
        };
        debug!(%kind, succeeded, phase = %self.phase, "Generation released");
    }

    /// Note that the post-generation check ran against `inspected`.
    pub fn mark_checked(&mut self, inspected: u64) {
        if self.phase == Phase::AwaitingErrorCheck && inspected == self.generation {
            self.phase = Phase::Idle;
        }
    }

    /// Forget everything. Refused while a generation is streaming.
    pub fn restart(&mut self) -> StudioResult<()> {
        if self.is_busy() {
            return Err(StudioError::Busy);
        }
        let generation = self.generation + 1;
        *self = Self::new(self.max_attempts);
        self.generation = generation;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_artifact() -> SessionState {
        let mut state = SessionState::new(3);
        state.begin(GenerationKind::Initial).unwrap();
        state.finish(GenerationKind::Initial, true, true);
        state
    }

    fn run_auto_fix(state: &mut SessionState, message: &str) -> Result<u32, SkipReason> {
        let attempt = state.claim_auto_fix(DetectedError::reported(message), state.generation())?;
        state.finish(GenerationKind::AutoFix, true, true);
        Ok(attempt)
    }

    #[test]
    fn test_initial_generation_flow() {
        let mut state = SessionState::new(3);
        assert!(!state.can_inspect());

        state.begin(GenerationKind::Initial).unwrap();
        assert_eq!(state.phase(), Phase::Generating);
        assert!(matches!(state.begin(GenerationKind::Initial), Err(StudioError::Busy)));

        state.finish(GenerationKind::Initial, true, true);
        assert_eq!(state.phase(), Phase::AwaitingErrorCheck);
        assert!(state.can_inspect());

        state.mark_checked(state.generation());
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[test]
    fn test_fix_requires_artifact() {
        let mut state = SessionState::new(3);
        assert!(matches!(state.begin(GenerationKind::ManualFix), Err(StudioError::NoArtifact)));
        assert_eq!(state.claim_auto_fix(DetectedError::reported("boom"), state.generation()), Err(SkipReason::NoArtifact));
    }

    #[test]
    fn test_failure_before_output_keeps_no_artifact() {
        let mut state = SessionState::new(3);
        state.begin(GenerationKind::Initial).unwrap();
        state.finish(GenerationKind::Initial, false, false);

        assert_eq!(state.phase(), Phase::Idle);
        assert!(!state.has_artifact());
    }

    #[test]
    fn test_duplicate_error_is_skipped() {
        let mut state = with_artifact();
        assert_eq!(run_auto_fix(&mut state, "A"), Ok(1));
        assert_eq!(run_auto_fix(&mut state, "A"), Err(SkipReason::Duplicate));
        assert_eq!(state.attempts(), 1);
    }

    #[test]
    fn test_alternating_errors_each_dispatch() {
        let mut state = with_artifact();
        assert_eq!(run_auto_fix(&mut state, "A"), Ok(1));
        assert_eq!(run_auto_fix(&mut state, "B"), Ok(2));
        assert_eq!(run_auto_fix(&mut state, "A"), Ok(3));
        assert_eq!(state.phase(), Phase::Exhausted);
    }

    #[test]
    fn test_budget_is_exhausted_after_three_attempts() {
        let mut state = with_artifact();
        for (i, msg) in ["A", "B", "C"].iter().enumerate() {
            assert_eq!(run_auto_fix(&mut state, msg), Ok(i as u32 + 1));
        }

        assert!(!state.can_inspect());
        assert_eq!(state.claim_auto_fix(DetectedError::reported("D"), state.generation()), Err(SkipReason::Exhausted));
        assert_eq!(state.attempts(), 3);
        assert_eq!(state.last_error().unwrap().message(), "C");
        assert_eq!(state.auto_fix_status().to_string(), "3/3");
    }

    #[test]
    fn test_no_claim_while_in_flight() {
        let mut state = with_artifact();
        state.begin(GenerationKind::ManualFix).unwrap();
        assert_eq!(state.claim_auto_fix(DetectedError::reported("A"), state.generation()), Err(SkipReason::Busy));

        state.finish(GenerationKind::ManualFix, true, true);
        assert_eq!(state.claim_auto_fix(DetectedError::reported("A"), state.generation()), Ok(1));
        assert!(state.auto_fix_status().in_progress);
        assert_eq!(state.claim_auto_fix(DetectedError::reported("B"), state.generation()), Err(SkipReason::Busy));
    }

    #[test]
    fn test_error_seen_before_a_newer_generation_is_stale() {
        let mut state = with_artifact();
        let inspected = state.generation();

        state.begin(GenerationKind::ManualFix).unwrap();
        state.finish(GenerationKind::ManualFix, true, true);
        assert_eq!(state.phase(), Phase::AwaitingErrorCheck);

        assert_eq!(
            state.claim_auto_fix(DetectedError::reported("A"), inspected),
            Err(SkipReason::Stale)
        );
        state.mark_checked(inspected);
        assert_eq!(state.phase(), Phase::AwaitingErrorCheck);
        assert_eq!(state.attempts(), 0);
        assert!(state.last_error().is_none());
    }

    #[test]
    fn test_generation_survives_restart() {
        let mut state = with_artifact();
        let before = state.generation();
        state.restart().unwrap();
        assert!(state.generation() > before);
    }

    #[test]
    fn test_manual_fix_success_resets_attempts() {
        let mut state = with_artifact();
        run_auto_fix(&mut state, "A").unwrap();
        run_auto_fix(&mut state, "B").unwrap();

        state.begin(GenerationKind::ManualFix).unwrap();
        state.finish(GenerationKind::ManualFix, true, true);

        assert_eq!(state.attempts(), 0);
        assert!(state.active_error().is_none());
        assert_eq!(state.last_error().unwrap().message(), "B");
    }

    #[test]
    fn test_failed_manual_fix_keeps_attempts() {
        let mut state = with_artifact();
        run_auto_fix(&mut state, "A").unwrap();

        state.begin(GenerationKind::ManualFix).unwrap();
        state.finish(GenerationKind::ManualFix, false, true);
        assert_eq!(state.attempts(), 1);
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[test]
    fn test_manual_fix_allowed_when_exhausted() {
        let mut state = with_artifact();
        for msg in ["A", "B", "C"] {
            run_auto_fix(&mut state, msg).unwrap();
        }

        state.begin(GenerationKind::ManualFix).unwrap();
        state.finish(GenerationKind::ManualFix, true, true);
        assert_eq!(state.phase(), Phase::AwaitingErrorCheck);
        assert!(state.can_inspect());
    }

    #[test]
    fn test_restart() {
        let mut state = with_artifact();
        run_auto_fix(&mut state, "A").unwrap();
        state.record_fix("make it blue", FixOrigin::Manual);

        state.begin(GenerationKind::ManualFix).unwrap();
        assert!(matches!(state.restart(), Err(StudioError::Busy)));
        state.finish(GenerationKind::ManualFix, false, false);

        state.restart().unwrap();
        assert_eq!(state.phase(), Phase::Idle);
        assert_eq!(state.attempts(), 0);
        assert!(!state.has_artifact());
        assert!(state.last_error().is_none());
        assert!(state.history().is_empty());
        assert_eq!(state.max_attempts(), 3);
    }
}
