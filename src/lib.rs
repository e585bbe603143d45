//! Tiered configuration reader.
//!
//! Typed reads of one application's configuration, served from an
//! in-process snapshot backed by an optional Redis tier and Postgres. See
//! [`ConfigReader`] for the entry point.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

pub use cache::{ConfigReader, Lookup, ReaderState, RefreshReport, Snapshot, TieredCache};
pub use config::ReaderOptions;
pub use domain::convert::{FromConfigValue, Json};
pub use domain::error::{ConversionError, ReadError};
