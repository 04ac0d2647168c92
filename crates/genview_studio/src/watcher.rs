//! Observation of the preview's error surface.
//!
//! Two kinds of source exist. A [`ChannelErrorSource`] receives structured
//! reports that the sandbox pushes; a [`DomErrorSource`] pattern-matches a
//! serialized copy of the rendered document. [`FallbackErrorSource`] asks the
//! first and falls back to the second.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::detect::{DetectedError, DomErrorScanner};
use crate::error::{StudioError, StudioResult};

/// Anything that can tell whether the preview currently shows an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ErrorSource: Send + Sync {
    /// Report the highest-priority error currently visible, if any.
    async fn inspect(&self) -> StudioResult<Option<DetectedError>>;

    /// Called when new code is loaded into the preview; drops anything
    /// observed about the previous code.
    fn reset(&self) {}
}

/// Supplies the serialized preview document.
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn document(&self) -> StudioResult<String>;

    /// Forget the current document.
    fn invalidate(&self) {}
}

/// Document snapshot the sandbox writes to disk after rendering.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DocumentProvider for SnapshotFile {
    async fn document(&self) -> StudioResult<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(html) => Ok(html),
            // Not rendered yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(StudioError::Inspect(format!(
                "cannot read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn invalidate(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove stale snapshot {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Scans a document for known error patterns.
pub struct DomErrorSource<D> {
    provider: D,
    scanner: DomErrorScanner,
}

impl<D: DocumentProvider> DomErrorSource<D> {
    pub fn new(provider: D) -> Self {
        Self {
            provider,
            scanner: DomErrorScanner::new(),
        }
    }
}

#[async_trait]
impl<D: DocumentProvider> ErrorSource for DomErrorSource<D> {
    async fn inspect(&self) -> StudioResult<Option<DetectedError>> {
        let html = self.provider.document().await?;
        Ok(self.scanner.scan(&html))
    }

    fn reset(&self) {
        self.provider.invalidate();
    }
}

/// Structured report pushed by the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxReport {
    /// The sandbox shows this error text
    Error(String),
    /// The sandbox rendered without errors
    Clean,
}

/// Sending half handed to the sandbox.
#[derive(Debug, Clone)]
pub struct DiagnosticSender {
    tx: mpsc::UnboundedSender<SandboxReport>,
}

impl DiagnosticSender {
    /// Returns false once the receiving source is gone.
    pub fn report_error(&self, message: impl Into<String>) -> bool {
        self.tx.send(SandboxReport::Error(message.into())).is_ok()
    }

    pub fn report_clean(&self) -> bool {
        self.tx.send(SandboxReport::Clean).is_ok()
    }
}

/// Error source fed by sandbox reports. The most recent report wins.
pub struct ChannelErrorSource {
    rx: Mutex<mpsc::UnboundedReceiver<SandboxReport>>,
    latest: Mutex<Option<DetectedError>>,
}

impl ChannelErrorSource {
    pub fn channel() -> (DiagnosticSender, ChannelErrorSource) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = ChannelErrorSource {
            rx: Mutex::new(rx),
            latest: Mutex::new(None),
        };
        (DiagnosticSender { tx }, source)
    }

    fn drain(&self) -> Vec<SandboxReport> {
        let mut rx = self.rx.lock();
        let mut reports = Vec::new();
        while let Ok(report) = rx.try_recv() {
            reports.push(report);
        }
        reports
    }
}

#[async_trait]
impl ErrorSource for ChannelErrorSource {
    async fn inspect(&self) -> StudioResult<Option<DetectedError>> {
        let reports = self.drain();
        let mut latest = self.latest.lock();
        for report in reports {
            *latest = match report {
                SandboxReport::Error(message) => DetectedError::classify(&message),
                SandboxReport::Clean => None,
            };
        }
        Ok(latest.clone())
    }

    fn reset(&self) {
        let dropped = self.drain().len();
        if dropped > 0 {
            debug!(dropped, "Discarded reports about previous code");
        }
        *self.latest.lock() = None;
    }
}

/// Prefers `primary`; asks `fallback` when it has nothing or fails.
pub struct FallbackErrorSource {
    primary: Arc<dyn ErrorSource>,
    fallback: Arc<dyn ErrorSource>,
}

impl FallbackErrorSource {
    pub fn new(primary: Arc<dyn ErrorSource>, fallback: Arc<dyn ErrorSource>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl ErrorSource for FallbackErrorSource {
    async fn inspect(&self) -> StudioResult<Option<DetectedError>> {
        match self.primary.inspect().await {
            Ok(Some(found)) => return Ok(Some(found)),
            Ok(None) => {}
            Err(e) => debug!("Primary error source failed, falling back: {}", e),
        }
        self.fallback.inspect().await
    }

    fn reset(&self) {
        self.primary.reset();
        self.fallback.reset();
    }
}

/// Runs one inspection pass over a source.
///
/// Inspection failures are logged and read as "no error": a check that
/// cannot look at the preview must not stall the session.
#[derive(Clone)]
pub struct ErrorWatcher {
    source: Arc<dyn ErrorSource>,
}

impl ErrorWatcher {
    pub fn new(source: Arc<dyn ErrorSource>) -> Self {
        Self { source }
    }

    pub async fn check(&self) -> Option<DetectedError> {
        match self.source.inspect().await {
            Ok(found) => {
                if let Some(error) = &found {
                    debug!(%error, "Preview shows an error");
                }
                found
            }
            Err(e) => {
                debug!("Error inspection failed: {}", e);
                None
            }
        }
    }

    pub fn reset(&self) {
        self.source.reset();
    }
}
