//! # File Action Runner
//!
//! Writes one file into the sandbox: ensures the parent directory exists, then
//! writes the trimmed content. Filesystem failures are logged and swallowed;
//! the action still completes.

use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::domain::traits::Sandbox;

pub struct FileActionRunner {
    sandbox: Arc<dyn Sandbox>,
}

impl FileActionRunner {
    pub fn new(sandbox: Arc<dyn Sandbox>) -> Self {
        Self { sandbox }
    }

    /// Returns `false` when cancellation stopped the action before the write was issued.
    pub async fn run(&self, file_path: &str, content: &str, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }

        if let Some(folder) = parent_folder(file_path) {
            match self.sandbox.mkdir(&folder).await {
                Ok(()) => tracing::debug!("Created folder {}", folder),
                Err(e) => tracing::error!("Failed to create folder {}: {:#}", folder, e),
            }
        }

        if cancel.is_cancelled() {
            tracing::debug!("Skipping write of {}: cancelled", file_path);
            return false;
        }

        // Model output is wrapped in blank lines; the file should not be.
        match self.sandbox.write_file(file_path, content.trim().as_bytes()).await {
            Ok(()) => tracing::debug!("File written {}", file_path),
            Err(e) => tracing::error!("Failed to write file {}: {:#}", file_path, e),
        }
        true
    }
}

/// Directory that must exist before writing `file_path`, or `None` for the project root.
pub fn parent_folder(file_path: &str) -> Option<String> {
    let parent = Path::new(file_path).parent()?.to_string_lossy().into_owned();
    let folder = parent.trim_end_matches('/');
    if folder.is_empty() || folder == "." {
        None
    } else {
        Some(folder.to_string())
    }
}
