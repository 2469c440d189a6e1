//! The invariant capability.

use std::{collections::BTreeSet, sync::Arc};

use tiermark_state::{ArchiveSnapshot, Bucket, BucketLevel, LedgerRange, LiveSnapshot};
use tiermark_types::{
    ContractEvent, EntryKey, LedgerDelta, Operation, OperationResult, TierTransitions,
};

use crate::error::CheckResult;

/// A named checker of ledger-state rules.
///
/// Every checkpoint returns `Ok(String::new())` when the invariant holds
/// and `Ok(diagnostic)` when it does not. `Err` means the invariant could
/// not be evaluated, and the manager escalates it regardless of strictness.
///
/// Checkpoints the invariant does not care about keep the default, which
/// passes. Implementations must not mutate ledger state; those that keep
/// their own state across calls do so through interior mutability.
pub trait Invariant: Send + Sync {
    /// Stable, process-unique name used for enabling and failure reporting.
    fn name(&self) -> &str;

    /// Whether a violation halts ledger processing.
    fn is_strict(&self) -> bool;

    /// Checks a bucket produced by a merge.
    ///
    /// `shadowed_keys` are keys whose records in this bucket are superseded
    /// by newer levels.
    fn check_on_bucket_apply(
        &self,
        _bucket: &Bucket,
        _range: LedgerRange,
        _level: BucketLevel,
        _shadowed_keys: &BTreeSet<EntryKey>,
    ) -> CheckResult {
        Ok(String::new())
    }

    /// Checks the state after a bulk load, once, at `newest_ledger`.
    fn check_after_assume_state(&self, _newest_ledger: u32) -> CheckResult {
        Ok(String::new())
    }

    /// Checks the effects of one applied operation.
    fn check_on_operation_apply(
        &self,
        _operation: &Operation,
        _result: &OperationResult,
        _delta: &LedgerDelta,
        _events: &[ContractEvent],
    ) -> CheckResult {
        Ok(String::new())
    }

    /// Checks the tier transitions of the ledger being committed.
    ///
    /// `live` and `archive` are the snapshots of the previous ledger, taken
    /// before `transitions` were applied.
    fn check_on_ledger_commit(
        &self,
        _live: &dyn LiveSnapshot,
        _archive: &dyn ArchiveSnapshot,
        _transitions: &TierTransitions,
    ) -> CheckResult {
        Ok(String::new())
    }

    /// One-time startup scan over complete snapshots.
    fn start(&self, _live: &dyn LiveSnapshot, _archive: &dyn ArchiveSnapshot) -> CheckResult {
        Ok(String::new())
    }
}

/// Shared handle to a registered invariant.
pub type InvariantRef = Arc<dyn Invariant>;
