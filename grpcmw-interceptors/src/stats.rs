//! Per-interceptor counters.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Statistics for an interceptor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterceptorStats {
    /// Total calls intercepted
    pub total_intercepted: u64,
    /// Total calls whose metadata was modified
    pub total_modified: u64,
    /// Total calls rejected
    pub total_blocked: u64,
    /// Average time spent inside the interceptor, downstream included, in milliseconds
    pub avg_processing_time_ms: f64,
    /// Last processed timestamp
    pub last_processed: Option<chrono::DateTime<chrono::Utc>>,
}

/// What an interceptor did with a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Passed,
    Modified,
    Blocked,
}

impl InterceptorStats {
    pub(crate) fn record(&mut self, started: Instant, outcome: Outcome) {
        self.total_intercepted += 1;
        self.last_processed = Some(chrono::Utc::now());

        match outcome {
            Outcome::Passed => {}
            Outcome::Modified => self.total_modified += 1,
            Outcome::Blocked => self.total_blocked += 1,
        }

        let elapsed = started.elapsed().as_secs_f64() * 1000.0;
        self.avg_processing_time_ms = (self.avg_processing_time_ms
            * (self.total_intercepted - 1) as f64
            + elapsed)
            / self.total_intercepted as f64;
    }
}
