//! Metrics Sink
//!
//! Metric formatting and exposition are external concerns; the pipeline
//! only reports observations through this capability.

use std::time::Duration;

use tracing::debug;

/// Receives pipeline timing observations.
pub trait MetricsSink: Send + Sync {
    /// Reports the wall time spent processing one frame.
    fn observe_frame_time(&self, elapsed: Duration);
}

/// Default sink that logs observations at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMetrics;

impl MetricsSink for LogMetrics {
    fn observe_frame_time(&self, elapsed: Duration) {
        debug!("Frame processed in {:.1} ms", elapsed.as_secs_f64() * 1000.0);
    }
}
