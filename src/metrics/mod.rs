//! Prometheus metrics for session lifecycle, guard decisions and dashboard queries.

mod recorder;

pub use recorder::{Metrics, MetricsRecorder};
