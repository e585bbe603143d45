//! Domain layer types and invariants.

pub mod convert;
pub mod entities;
pub mod error;
