//! # RTS Test Utilities
//!
//! Shared testing utilities for the AI crates:
//! - Snapshot fixtures and a fluent world builder
//! - Determinism harness (repeat runs, parallel vs sequential, state round-trip)
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;
