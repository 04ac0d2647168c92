//! Automatic repair of detected preview errors.
//!
//! A detected error becomes a fix instruction when every guard passes: no
//! generation in flight, budget left, code present, and the message differs
//! from the last one acted on. The error must also have been read from the
//! current code. The guards and the claim are evaluated as a single
//! [`SessionState`] transition.

use genview_protocol::{Toolkit, BASE_TOOLKIT};
use tracing::{debug, info};

use crate::detect::{DetectedError, ErrorKind};
use crate::session::{SessionState, SkipReason};

/// Outcome of evaluating one detected error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoFixDecision {
    /// The session is claimed; send `instruction` as fix `attempt`
    Dispatch { attempt: u32, instruction: String },
    /// Nothing to do
    Skip(SkipReason),
}

/// Turns detected errors into fix instructions.
#[derive(Debug, Clone, Copy)]
pub struct AutoFixController {
    toolkit: Toolkit,
}

impl Default for AutoFixController {
    fn default() -> Self {
        Self::new(BASE_TOOLKIT)
    }
}

impl AutoFixController {
    pub fn new(toolkit: Toolkit) -> Self {
        Self { toolkit }
    }

    /// Evaluate `error`, read under generation `inspected`, against the
    /// session and claim it for a fix if allowed.
    pub fn evaluate(
        &self,
        state: &mut SessionState,
        error: DetectedError,
        inspected: u64,
    ) -> AutoFixDecision {
        let instruction = self.instruction_for(&error);
        match state.claim_auto_fix(error, inspected) {
            Ok(attempt) => {
                info!(attempt, max = state.max_attempts(), "Dispatching auto-fix");
                AutoFixDecision::Dispatch {
                    attempt,
                    instruction,
                }
            }
            Err(reason) => {
                debug!(?reason, "Auto-fix skipped");
                AutoFixDecision::Skip(reason)
            }
        }
    }

    /// Fix instruction for one error.
    pub fn instruction_for(&self, error: &DetectedError) -> String {
        match &error.kind {
            ErrorKind::MissingModule { module } => format!(
                "The preview fails with \"Cannot find module '{module}'\". \
                 If '{module}' is a misspelling of an existing import or a local \
                 file, correct the import path. Otherwise remove every import of \
                 '{module}' and rebuild what it provided using only {}. \
                 Do not add any other dependency.",
                self.toolkit.describe()
            ),
            ErrorKind::UndefinedReference { identifier } => format!(
                "The preview fails with \"{identifier} is not defined\". \
                 Add the missing import or declaration for '{identifier}'."
            ),
            ErrorKind::Reported => format!("Fix this error: {}", error.message),
        }
    }
}
