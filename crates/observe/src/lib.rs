//! Observability setup shared by all binaries and libraries of the auction:
//! logging initialisation, the global metrics registry and helpers to time
//! futures.
pub mod config;
pub mod future;
pub mod metrics;
pub mod tracing;

pub use config::Config;
