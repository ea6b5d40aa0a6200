//! Test module for determinism and integration tests.
//!
//! - **Determinism tests**: Verify same seed produces identical runs
//! - **Integration tests**: End-to-end runs through population, scheduler and clock
//! - **Helper functions**: Utilities for test setup
//!
//! # Test Structure
//!
//! - `determinism.rs`: Tests that verify deterministic execution
//! - `integration.rs`: End-to-end tests of the simulation
//! - `helpers.rs`: Test setup utilities and factory functions

mod helpers;

// Re-export for convenience
pub use helpers::*;
