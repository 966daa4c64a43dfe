#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Observability: Prometheus metrics wired to the stats engine.

pub mod metrics;

pub use metrics::{Metrics, MetricsError};
