//! Tiered configuration cache
//!
//! Serves one application's configuration from three tiers:
//!
//! - **Snapshot**: immutable in-process map, read without locks
//! - **Distributed**: shared Redis tier keyed `config:{app}:{key}`
//! - **Durable**: Postgres, the source of truth
//!
//! A background [`RefreshScheduler`] rebuilds the snapshot on an interval and
//! publishes it with a single atomic swap.
//!
//! ## Configuration
//!
//! ```toml
//! [reader]
//! application_name = "SERVICE-A"
//! refresh_interval_seconds = 30
//! distributed_cache_ttl_minutes = 5
//! ```

mod config;
mod error;
mod facade;
pub mod keys;
mod lookup;
pub mod metrics;
mod reader;
mod scheduler;
mod snapshot;
mod state;

pub use config::CacheConfig;
pub use error::{InitError, RefreshError};
pub use facade::ConfigReader;
pub use lookup::Lookup;
pub use reader::{RefreshReport, TieredCache};
pub use scheduler::RefreshScheduler;
pub use snapshot::Snapshot;
pub use state::ReaderState;
