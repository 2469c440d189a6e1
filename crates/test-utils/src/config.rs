//! Test configuration helpers.

use std::time::Duration;

use tiermark_types::config::{InvariantConfig, SnapshotConfig};

/// Returns an invariant configuration enabling `checks`.
///
/// Slow-check thresholds are raised to a minute so debug builds never
/// log slow-check warnings that would disturb log-capture assertions.
///
/// # Panics
///
/// Panics if any pattern is invalid.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_invariant_config(checks: &[&str]) -> InvariantConfig {
    InvariantConfig::builder()
        .checks(checks.iter().map(|c| (*c).to_string()).collect())
        .slow_commit_check_threshold(Duration::from_secs(60))
        .slow_startup_check_threshold(Duration::from_secs(60))
        .build()
        .expect("valid test invariant config")
}

/// Returns a snapshot configuration retaining `history_depth` ledgers.
///
/// # Panics
///
/// Panics if `history_depth` is zero.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_snapshot_config(history_depth: usize) -> SnapshotConfig {
    SnapshotConfig::builder()
        .history_depth(history_depth)
        .build()
        .expect("valid test snapshot config")
}
