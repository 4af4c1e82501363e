//! Word-processor documents: one atomic conversion by an external tool.
//!
//! pandoc reads from a path, so the upload is written into a `TempDir` that
//! is removed when the conversion returns, whether it succeeded or not.

use crate::error::ExtractionError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

/// Converts a whole word-processor document to Markdown in one call.
#[async_trait]
pub trait WordConverter: Send + Sync {
    async fn convert(&self, bytes: &[u8], filename: &str) -> Result<String, ExtractionError>;
}

/// [`WordConverter`] that shells out to `pandoc -t gfm`.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    program: PathBuf,
    timeout: Duration,
}

impl Default for PandocConverter {
    fn default() -> Self {
        Self {
            program: PathBuf::from("pandoc"),
            timeout: Duration::from_secs(120),
        }
    }
}

impl PandocConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific pandoc binary.
    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Keep only the final path component and fall back to a fixed name, so
/// the temp file can never escape its directory.
fn temp_name(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("document.docx")
        .to_string()
}

#[async_trait]
impl WordConverter for PandocConverter {
    async fn convert(&self, bytes: &[u8], filename: &str) -> Result<String, ExtractionError> {
        let fail = |detail: String| ExtractionError::WordConversion { detail };

        let dir = TempDir::new().map_err(|e| fail(format!("temp dir: {e}")))?;
        let input = dir.path().join(temp_name(filename));
        tokio::fs::write(&input, bytes)
            .await
            .map_err(|e| fail(format!("writing {}: {e}", input.display())))?;

        let child = Command::new(&self.program)
            .arg(&input)
            .args(["-t", "gfm", "--wrap=none"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| fail(format!("could not start {}: {e}", self.program.display())))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| fail(format!("timed out after {}s", self.timeout.as_secs())))?
            .map_err(|e| fail(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(format!("{} ({})", stderr.trim(), output.status)));
        }

        let markdown = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("pandoc converted {} → {} chars", filename, markdown.len());
        Ok(markdown)
    }
}
