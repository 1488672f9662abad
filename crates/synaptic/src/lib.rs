//! Public facade crate for `synaptic`.
//!
//! This crate contains no IO or provider-specific logic.
//! It re-exports the backend-agnostic types/traits from `synaptic-core`.

pub use synaptic_core::*;
