//! Statistics and metrics for the control plane

pub mod metrics;

pub use metrics::{ServerMetrics, ServerStats};
