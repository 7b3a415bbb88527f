//! # Domain Layer
//!
//! Core definitions, types, and traits of the action engine.
//! Independent of any concrete sandbox, serving as the contract for the other layers.

pub mod config;
pub mod traits;
pub mod types;
