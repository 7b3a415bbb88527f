//! Output classification for shell actions.
//!
//! This module keeps all text matching out of the shell runner:
//! - Classifiers are pure functions over a chunk of output
//! - The runner only sees the resulting [`ChunkSignals`]
//! - Alternative policies plug in through [`OutputClassifier`]

pub mod ansi;
pub mod phrases;
pub mod port;

pub use ansi::strip_ansi;
pub use phrases::{is_build_success, is_error_output, is_run_command, needs_confirmation};
pub use port::detect_port;

use crate::domain::config::EarlyCompletionConfig;

/// What a single output chunk tells us about the running process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkSignals {
    /// Chunk belongs in the error buffer.
    pub error: bool,
    /// Process is waiting on a yes/no answer.
    pub confirmation: bool,
    /// Dev server announced this port.
    pub port: Option<u16>,
    /// Build tool reported success.
    pub build_success: bool,
}

impl ChunkSignals {
    /// The process can be reported as done even if it keeps running.
    pub fn early_completion(&self) -> bool {
        self.port.is_some() || self.build_success
    }
}

/// Strategy for interpreting shell output.
pub trait OutputClassifier: Send + Sync {
    /// Whether early-completion signals apply to this command at all.
    fn is_run_command(&self, command: &str) -> bool;

    /// Classify one raw chunk. Early-completion fields are only filled for run commands.
    fn classify(&self, chunk: &str, run_command: bool) -> ChunkSignals;
}

/// Classifier built from the configured run markers and success phrases.
#[derive(Debug, Clone)]
pub struct DefaultClassifier {
    run_markers: Vec<String>,
    success_phrases: Vec<String>,
}

impl DefaultClassifier {
    pub fn new(config: &EarlyCompletionConfig) -> Self {
        Self {
            run_markers: config.run_markers.clone(),
            success_phrases: config.success_phrases.clone(),
        }
    }
}

impl Default for DefaultClassifier {
    fn default() -> Self {
        Self::new(&EarlyCompletionConfig::default())
    }
}

impl OutputClassifier for DefaultClassifier {
    fn is_run_command(&self, command: &str) -> bool {
        is_run_command(command, &self.run_markers)
    }

    fn classify(&self, chunk: &str, run_command: bool) -> ChunkSignals {
        let mut signals = ChunkSignals {
            error: is_error_output(chunk),
            confirmation: needs_confirmation(chunk),
            ..Default::default()
        };

        if run_command {
            let clean = strip_ansi(chunk);
            signals.port = detect_port(clean.trim());
            // Port wins; the success phrase is only consulted without one.
            if signals.port.is_none() {
                signals.build_success = is_build_success(chunk, &self.success_phrases);
            }
        }

        signals
    }
}
