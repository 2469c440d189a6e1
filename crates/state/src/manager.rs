//! Current and historical snapshot pairs.
//!
//! The ledger-close path publishes a new live/archive pair once per ledger.
//! Readers on any thread copy out `Arc` handles; a published snapshot is
//! never modified, so holding a handle needs no further locking.
//!
//! - Multiple concurrent readers (via `RwLock::read()`)
//! - Exclusive write access when publishing (via `RwLock::write()`)
//!
//! The live and archive handles are kept under one lock so a reader always
//! gets a pair captured at the same ledger.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tiermark_types::config::SnapshotConfig;

use crate::{
    error::{Result, SnapshotError},
    snapshot::{ArchiveSnapshotRef, LiveSnapshotRef},
};

/// A live/archive snapshot pair captured at one ledger.
#[derive(Clone)]
pub struct SnapshotPair {
    /// Live store view.
    pub live: LiveSnapshotRef,
    /// Archive store view.
    pub archive: ArchiveSnapshotRef,
}

impl SnapshotPair {
    /// Pairs two snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::LedgerMismatch`] if they were captured at
    /// different ledgers.
    pub fn new(live: LiveSnapshotRef, archive: ArchiveSnapshotRef) -> Result<Self> {
        if live.ledger_seq() != archive.ledger_seq() {
            return Err(SnapshotError::LedgerMismatch {
                live: live.ledger_seq(),
                archive: archive.ledger_seq(),
            });
        }
        Ok(Self { live, archive })
    }

    /// Ledger both snapshots were captured at.
    pub fn ledger_seq(&self) -> u32 {
        self.live.ledger_seq()
    }
}

impl std::fmt::Debug for SnapshotPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotPair").field("ledger_seq", &self.ledger_seq()).finish()
    }
}

#[derive(Default)]
struct History {
    current: Option<SnapshotPair>,
    historical: BTreeMap<u32, SnapshotPair>,
}

/// Holds the current snapshot pair plus a bounded history keyed by ledger.
pub struct SnapshotManager {
    history: RwLock<History>,
    history_depth: usize,
}

impl SnapshotManager {
    /// Creates an empty manager.
    ///
    /// `config.history_depth` counts the current pair, so a depth of 1
    /// retains no history.
    pub fn new(config: &SnapshotConfig) -> Self {
        Self { history: RwLock::new(History::default()), history_depth: config.history_depth.max(1) }
    }

    /// Publishes the pair for a newly closed ledger.
    ///
    /// The previous current pair moves into history; the oldest historical
    /// pair is dropped once the depth is exceeded.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::SequenceRegression`] if `pair` does not
    /// advance past the current ledger.
    pub fn publish(&self, pair: SnapshotPair) -> Result<()> {
        let mut history = self.history.write();
        if let Some(current) = &history.current
            && pair.ledger_seq() <= current.ledger_seq()
        {
            return Err(SnapshotError::SequenceRegression {
                current: current.ledger_seq(),
                attempted: pair.ledger_seq(),
            });
        }

        let ledger_seq = pair.ledger_seq();
        if let Some(previous) = history.current.replace(pair) {
            history.historical.insert(previous.ledger_seq(), previous);
        }
        while history.historical.len() >= self.history_depth {
            if history.historical.pop_first().is_none() {
                break;
            }
        }
        tracing::debug!(ledger_seq, retained = history.historical.len() + 1, "Published snapshot pair");
        Ok(())
    }

    /// Returns the current pair, if any has been published.
    pub fn current(&self) -> Option<SnapshotPair> {
        self.history.read().current.clone()
    }

    /// Returns the ledger of the current pair.
    pub fn ledger_seq(&self) -> Option<u32> {
        self.history.read().current.as_ref().map(SnapshotPair::ledger_seq)
    }

    /// Returns the pair captured at `ledger_seq`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NotFound`] if that ledger is not retained.
    pub fn at(&self, ledger_seq: u32) -> Result<SnapshotPair> {
        let history = self.history.read();
        if let Some(current) = &history.current
            && current.ledger_seq() == ledger_seq
        {
            return Ok(current.clone());
        }
        history.historical.get(&ledger_seq).cloned().ok_or(SnapshotError::NotFound { ledger_seq })
    }

    /// Ledgers currently retrievable via [`Self::at`], ascending.
    pub fn retained_ledgers(&self) -> Vec<u32> {
        let history = self.history.read();
        history
            .historical
            .keys()
            .copied()
            .chain(history.current.as_ref().map(SnapshotPair::ledger_seq))
            .collect()
    }
}
