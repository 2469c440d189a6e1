//! Slow-execution guard.

use std::time::{Duration, Instant};

/// Logs a warning on drop if the guarded scope ran longer than its threshold.
pub(crate) struct SlowExecutionGuard {
    label: &'static str,
    threshold: Duration,
    start: Instant,
}

impl SlowExecutionGuard {
    pub(crate) fn new(label: &'static str, threshold: Duration) -> Self {
        Self { label, threshold, start: Instant::now() }
    }
}

impl Drop for SlowExecutionGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        if elapsed > self.threshold {
            tracing::warn!(
                check = self.label,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                threshold_ms = self.threshold.as_secs_f64() * 1000.0,
                "{} took {:?}",
                self.label,
                elapsed
            );
        }
    }
}
