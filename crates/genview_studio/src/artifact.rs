//! The current-best generated code.

/// Snapshot of the code buffer published to the display layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeArtifact {
    /// Source text
    pub code: String,
    /// Bumped on every update so observers can tell snapshots apart
    pub revision: u64,
    /// Whether the generation that wrote `code` finished successfully
    pub complete: bool,
}

impl CodeArtifact {
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}
