//! # genview_studio
//!
//! Client side of genview: the control loop that turns a prompt into a
//! previewable component and keeps it running.
//!
//! ## Key Features
//!
//! - **Streaming Assembly**: fragments are folded into the current code as they arrive
//! - **Fix Loop**: manual fix instructions re-enter generation with the current code
//! - **Error Watching**: the preview's error surface is inspected after each
//!   generation and on a fixed interval
//! - **Auto-Fix**: distinct errors trigger targeted fix requests, bounded to three attempts
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   request    ┌──────────────────┐   NDJSON   ┌──────────────┐
//! │    Studio    │─────────────▶│   Orchestrator   │◀──────────│  Transport   │
//! └──────┬───────┘              └────────┬─────────┘            └──────────────┘
//!        │ schedule                      │ code
//!        ▼                               ▼
//! ┌──────────────┐   error      ┌──────────────────┐
//! │ Error Watcher│◀─────────────│  Preview Sandbox │
//! └──────┬───────┘              └──────────────────┘
//!        ▼
//! ┌──────────────┐
//! │   Auto-Fix   │── fix ──▶ Orchestrator
//! └──────────────┘
//! ```
//!
//! Every guard check and the state change that follows it happen inside one
//! `SessionState` transition, so scheduled checks and user actions cannot
//! interleave between check and mutation.

pub mod artifact;
pub mod autofix;
pub mod config;
pub mod detect;
pub mod error;
pub mod mock;
pub mod orchestrator;
pub mod preview;
pub mod session;
pub mod studio;
pub mod transcript;
pub mod transport;
pub mod watcher;

pub use artifact::CodeArtifact;
pub use autofix::{AutoFixController, AutoFixDecision};
pub use config::StudioConfig;
pub use detect::{DetectedError, DomErrorScanner, ErrorKind};
pub use error::{StudioError, StudioResult};
pub use orchestrator::Orchestrator;
pub use preview::{DirectoryPreview, PreviewBundle, PreviewSandbox};
pub use session::{
    AutoFixStatus, ErrorObservation, FixOrigin, FixRecord, GenerationKind, Phase, SessionState,
    SkipReason,
};
pub use studio::{CheckOutcome, Studio, StudioEvent};
pub use transcript::Transcript;
pub use transport::{EventStream, GenerationTransport, HttpTransport};
pub use watcher::{
    ChannelErrorSource, DiagnosticSender, DocumentProvider, DomErrorSource, ErrorSource,
    ErrorWatcher, FallbackErrorSource, SandboxReport, SnapshotFile,
};
