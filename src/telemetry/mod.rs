//! Pool telemetry.
//!
//! Counters are always collected. With the `telemetry` feature the job
//! latency distribution is also recorded in an HDR histogram.

pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
