//! Shared test utilities for Tiermark crates.
//!
//! - [`fixtures`] - Entry, header and snapshot builders keyed by small seeds
//! - [`strategies`] - Proptest strategies for entries, transitions and ledger histories
//! - [`SimulatedLedger`] - A correct-by-construction ledger that closes with real tier transitions
//! - [`LogCapture`] - Records `tracing` events emitted inside a closure
//! - [`TestDir`] - Managed temporary directory with path helpers
//! - [`test_invariant_config`] / [`test_snapshot_config`] - Configurations for tests

#![deny(unsafe_code)]
// Test utilities are allowed to use unwrap for simplicity
#![cfg_attr(test, allow(clippy::disallowed_methods))]

pub mod fixtures;
pub mod strategies;

mod test_dir;
pub use test_dir::TestDir;

mod config;
pub use config::{test_invariant_config, test_snapshot_config};

mod log_capture;
pub use log_capture::{CapturedEvent, LogCapture};

mod simulated;
pub use simulated::{ClosedLedger, SimAction, SimulatedLedger};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use tracing::Level;

    use super::*;

    // ============================================
    // TestDir tests
    // ============================================

    #[test]
    fn test_dir_creates_temp_directory() {
        let dir = TestDir::new();
        assert!(dir.path().exists(), "temp directory should exist");
        assert!(dir.path().is_dir(), "should be a directory");
    }

    #[test]
    fn test_dir_join_stays_inside_directory() {
        let dir = TestDir::new();
        let subpath = dir.join("images/nested");
        assert!(subpath.starts_with(dir.path()));
        assert!(subpath.ends_with("images/nested"));
    }

    #[test]
    fn test_dir_cleanup_on_drop() {
        let path = {
            let dir = TestDir::new();
            let p = dir.path().to_path_buf();
            std::fs::write(p.join("000000001.snap"), "data").expect("write file");
            p
        };
        assert!(!path.exists(), "temp directory should be cleaned up on drop");
    }

    // ============================================
    // LogCapture tests
    // ============================================

    #[test]
    fn test_log_capture_records_level_message_and_fields() {
        let capture = LogCapture::new();
        capture.run(|| {
            tracing::info!(ledger = 7u32, "closing ledger");
            tracing::error!(severity = "fatal", "broken");
        });

        let events = capture.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level, Level::INFO);
        assert_eq!(events[0].message, "closing ledger");
        assert_eq!(events[0].fields.get("ledger").map(String::as_str), Some("7"));
        assert_eq!(capture.events_at(Level::ERROR).len(), 1);
        assert_eq!(capture.events_with_field("severity", "fatal")[0].message, "broken");
    }

    #[test]
    fn test_log_capture_ignores_events_outside_run() {
        let capture = LogCapture::new();
        tracing::warn!("outside");
        capture.run(|| {});
        assert!(capture.events().is_empty());
    }

    // ============================================
    // Config helper tests
    // ============================================

    #[test]
    fn test_invariant_config_carries_checks() {
        let config = test_invariant_config(&["ArchivedState.*", "TtlEntriesMatchOwners"]);
        assert_eq!(config.checks.len(), 2);
        assert_eq!(config.checks[0], "ArchivedState.*");
    }

    #[test]
    fn test_snapshot_config_carries_depth() {
        let config = test_snapshot_config(3);
        assert_eq!(config.history_depth, 3);
    }
}
