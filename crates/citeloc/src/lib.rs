//! Public facade crate for `citeloc`.
//!
//! This crate contains no parsing or matching logic.
//! It re-exports the backend-agnostic types/traits from `citeloc-core`.

pub use citeloc_core::*;
