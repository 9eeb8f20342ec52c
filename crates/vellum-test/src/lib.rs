//! Vellum Test - Harness and fuzzing tools for engine validation
//!
//! This crate provides:
//! - A replica simulator with a working map, snapshot and undo/redo
//!   history, standing in for the surrounding application
//! - A seeded mutation fuzzer for convergence and round-trip testing

pub mod fuzzer;
pub mod scenario;

pub use fuzzer::*;
pub use scenario::*;
