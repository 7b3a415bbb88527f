//! # Domain Traits
//!
//! Capability interfaces the engine runs against. The sandbox provides
//! filesystem and process primitives; the output sink receives terminal text.
//! Implementations live in the Infrastructure layer.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Filesystem and process-spawn capability of one session sandbox.
///
/// Paths are sandbox-relative: `/` and `.` both name the project root.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Read a file. Fails when it does not exist.
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Write a file, replacing any existing content.
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()>;

    /// Create a directory and all missing parents.
    async fn mkdir(&self, path: &str) -> Result<()>;

    /// Spawn `shell` with `args` and extra environment variables.
    async fn spawn(
        &self,
        shell: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Box<dyn ProcessHandle>>;
}

/// What a running process did next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Output(String),
    /// The process itself exited. Background children may still hold its output open.
    Exited(i32),
}

/// A running process inside the sandbox.
#[async_trait]
pub trait ProcessHandle: Send {
    /// Next output chunk or the exit, whichever comes first.
    /// Output already buffered is delivered before the exit.
    async fn next_event(&mut self) -> Result<ProcessEvent>;

    /// Next chunk of merged stdout/stderr. `None` once the output stream ends.
    async fn next_output(&mut self) -> Option<String>;

    /// Write to the process's stdin.
    async fn write_input(&mut self, data: &str) -> Result<()>;

    /// Wait for the process to exit and return its exit code.
    async fn wait(&mut self) -> Result<i32>;

    /// Request termination. Fire-and-forget.
    fn kill(&mut self);
}

/// Receives raw process output and synthetic annotation lines.
pub trait OutputSink: Send + Sync {
    fn write(&self, text: &str);
}
