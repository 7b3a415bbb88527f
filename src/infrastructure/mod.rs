//! # Infrastructure Layer
//!
//! Implements the traits defined in the Domain layer against the host:
//! the local sandbox, output sinks and logging setup.

pub mod logging;
#[cfg(test)]
pub mod mock;
pub mod sandbox;
pub mod sink;
