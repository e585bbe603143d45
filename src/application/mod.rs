//! Application layer: adapter contracts and operator-facing errors.

pub mod error;
pub mod repos;
