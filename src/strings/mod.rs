//! # Strings Module
//!
//! Centralizes user-facing strings: sink annotations and CLI summaries.

pub mod messages;
