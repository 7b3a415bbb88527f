//! Late-bound handle to the output sink.
//!
//! The UI may attach its terminal after actions were already queued, so
//! runners look the sink up on every write instead of capturing it.

use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::traits::OutputSink;

#[derive(Clone, Default)]
pub struct SharedSink {
    slot: Arc<RwLock<Option<Arc<dyn OutputSink>>>>,
}

impl SharedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, sink: Arc<dyn OutputSink>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    /// Writes to the attached sink; dropped silently when none is attached.
    pub fn write(&self, text: &str) {
        let sink = self
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(sink) = sink {
            sink.write(text);
        }
    }
}
