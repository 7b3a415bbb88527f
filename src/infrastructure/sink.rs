//! # Output Sinks
//!
//! Concrete `OutputSink` implementations: the process's stdout for the CLI and
//! an in-memory buffer for embedding and tests.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use crate::domain::traits::OutputSink;

/// Streams output straight to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

/// Accumulates everything written to it.
#[derive(Debug, Default)]
pub struct BufferSink {
    buffer: Mutex<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl OutputSink for BufferSink {
    fn write(&self, text: &str) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(text);
    }
}
