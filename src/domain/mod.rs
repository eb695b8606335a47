//! Domain layer types and invariants.

pub mod cache;
pub mod content;
pub mod purge;
