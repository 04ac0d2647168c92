//! Preview sandbox scaffolding.
//!
//! A generated component is mounted into a fixed three-file project: the
//! component itself, an entry that renders it into `#root`, and an HTML page
//! that pulls Tailwind from its CDN.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{StudioError, StudioResult};

/// Path of the generated component inside the sandbox.
pub const APP_PATH: &str = "/App.tsx";
/// Path of the entry point that mounts the component.
pub const ENTRY_PATH: &str = "/index.tsx";
/// Path of the host page.
pub const HTML_PATH: &str = "/public/index.html";

const ENTRY_SOURCE: &str = r#"import React, { StrictMode } from "react";
import { createRoot } from "react-dom/client";
import App from "./App";

const root = createRoot(document.getElementById("root")!);
root.render(
  <StrictMode>
    <App />
  </StrictMode>
);
"#;

const HTML_SOURCE: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <script src="https://cdn.tailwindcss.com"></script>
  </head>
  <body>
    <div id="root"></div>
  </body>
</html>
"#;

/// Files handed to the sandbox, keyed by absolute sandbox path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewBundle {
    files: BTreeMap<String, String>,
}

impl PreviewBundle {
    /// Scaffold around `code`.
    pub fn for_artifact(code: impl Into<String>) -> Self {
        let mut files = BTreeMap::new();
        files.insert(APP_PATH.to_string(), code.into());
        files.insert(ENTRY_PATH.to_string(), ENTRY_SOURCE.to_string());
        files.insert(HTML_PATH.to_string(), HTML_SOURCE.to_string());
        Self { files }
    }

    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    pub fn app_source(&self) -> &str {
        self.files.get(APP_PATH).map(String::as_str).unwrap_or_default()
    }
}

/// Something that renders a bundle.
#[async_trait]
pub trait PreviewSandbox: Send + Sync {
    async fn load(&self, bundle: &PreviewBundle) -> StudioResult<()>;
}

/// Writes the bundle into a directory for an external dev server to pick up.
#[derive(Debug, Clone)]
pub struct DirectoryPreview {
    root: PathBuf,
}

impl DirectoryPreview {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, sandbox_path: &str) -> PathBuf {
        self.root.join(sandbox_path.trim_start_matches('/'))
    }
}

#[async_trait]
impl PreviewSandbox for DirectoryPreview {
    async fn load(&self, bundle: &PreviewBundle) -> StudioResult<()> {
        for (path, contents) in bundle.files() {
            let target = self.resolve(path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StudioError::Preview(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
            tokio::fs::write(&target, contents)
                .await
                .map_err(|e| StudioError::Preview(format!("cannot write {}: {}", target.display(), e)))?;
            debug!("Wrote {}", target.display());
        }
        info!("Preview updated in {}", self.root.display());
        Ok(())
    }
}
