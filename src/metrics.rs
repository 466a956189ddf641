//! Prediction Metrics

use parking_lot::RwLock;
use std::time::Duration;

/// Fixed evaluation figures reported until a labelled evaluation set exists
pub const PLACEHOLDER_ACCURACY: f64 = 0.85;
/// Reported precision
pub const PLACEHOLDER_PRECISION: f64 = 0.82;
/// Reported recall
pub const PLACEHOLDER_RECALL: f64 = 0.88;
/// Reported F1 score
pub const PLACEHOLDER_F1: f64 = 0.85;

/// Accumulated counters, append-only for the life of the process
#[derive(Debug, Clone, Default)]
pub struct MetricsState {
    /// Completed predictions
    pub total_predictions: u64,
    /// Response latencies (seconds), in completion order
    pub response_times: Vec<f64>,
}

impl MetricsState {
    /// Mean latency in seconds, 0.0 before the first prediction
    pub fn avg_response_time(&self) -> f64 {
        if self.response_times.is_empty() {
            0.0
        } else {
            self.response_times.iter().sum::<f64>() / self.response_times.len() as f64
        }
    }
}

/// Thread-safe metrics tracker
#[derive(Debug, Default)]
pub struct MetricsTracker {
    state: RwLock<MetricsState>,
}

impl MetricsTracker {
    /// Empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed prediction
    pub fn record(&self, elapsed: Duration) {
        let mut state = self.state.write();
        state.total_predictions += 1;
        state.response_times.push(elapsed.as_secs_f64());
    }

    /// Completed predictions so far
    pub fn total_predictions(&self) -> u64 {
        self.state.read().total_predictions
    }

    /// Mean latency in seconds
    pub fn avg_response_time(&self) -> f64 {
        self.state.read().avg_response_time()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> MetricsState {
        self.state.read().clone()
    }
}
