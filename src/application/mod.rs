//! # Application Layer
//!
//! Orchestration of actions: the observable state store, the sequential
//! executor, the per-type runners and the `ActionRunner` facade tying them together.

pub mod executor;
pub mod file_action;
pub mod output;
pub mod runner;
pub mod shell_action;
pub mod store;
