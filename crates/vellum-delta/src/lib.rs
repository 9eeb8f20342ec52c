//! Vellum Delta - Structural diffs and change-set containers
//!
//! This crate implements the change capture half of the engine:
//! - The `Delta` primitive: an immutable {deleted, inserted} partial pair
//! - Typed patches with enumerated fields and declared merge strategies
//! - `ElementsDelta`: per-element change-set over a scene
//! - `AppStateDelta`: change-set over the observed UI-state projection
//! - The plain wire shape and `restore()` hydration

pub mod app_state;
pub mod delta;
pub mod elements;
pub mod patch;
pub mod wire;

pub use app_state::*;
pub use delta::*;
pub use elements::*;
pub use patch::*;
pub use wire::*;
