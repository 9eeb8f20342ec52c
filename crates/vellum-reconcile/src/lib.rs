//! Vellum Reconcile - Convergent merge of concurrently-edited scenes
//!
//! This crate implements the reconciler: it merges a local element
//! sequence with a remotely-received, optionally order-annotated batch
//! into one consistent sequence, resolving per-id content through the
//! version/nonce vocabulary shared with the delta layer. Merging is
//! deterministic and commutative, so independent replicas converge on the
//! same scene without central coordination.

pub mod reconcile;

pub use reconcile::*;
