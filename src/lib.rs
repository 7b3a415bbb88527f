//! # Action Runner
//!
//! Executes the file-write and shell-command actions an assistant emits while
//! streaming, one at a time and in dispatch order, inside a sandbox.
//!
//! - Domain: records, states, configuration and capability traits
//! - Application: state store, sequential executor, runners
//! - Infrastructure: local sandbox, output sinks, logging
//! - Patterns: output classification heuristics

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod patterns;
pub mod strings;
