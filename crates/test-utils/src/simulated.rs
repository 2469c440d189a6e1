//! A simulated ledger that moves contract entries between tiers.
//!
//! [`SimulatedLedger`] plays the apply pipeline: changes are staged, and
//! [`SimulatedLedger::close`] evicts expired persistent entries, deletes
//! expired temporary ones, performs staged restorations, and publishes the
//! next live/archive snapshot pair. Every close reports the tier
//! transitions alongside the snapshots they were computed from, ready to
//! hand to a ledger-commit check.
//!
//! The simulation follows the tiering rules, so a correct checker must
//! accept every ledger it closes.

use std::collections::{BTreeMap, BTreeSet};

use tiermark_state::{InMemoryArchiveSnapshot, InMemoryLiveSnapshot, LiveSnapshot, SnapshotError};
use tiermark_types::{
    Durability, Entry, EntryKey, FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION, LedgerHeader,
    ProtocolVersion, TierTransitions,
};

use crate::fixtures::contract_data;

/// One step of a simulated ledger history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimAction {
    /// Create a contract data entry with a TTL `lifetime` ledgers past the next ledger.
    Create {
        /// Key seed.
        seed: u8,
        /// Lifetime class.
        durability: Durability,
        /// Value byte.
        val: u8,
        /// Ledgers the entry stays live after the next ledger.
        lifetime: u32,
    },
    /// Update the live value of a persistent entry whose TTL is still live.
    Update {
        /// Key seed.
        seed: u8,
        /// New value byte.
        val: u8,
    },
    /// Restore a persistent entry, from the archive or in place.
    Restore {
        /// Key seed.
        seed: u8,
        /// Ledgers the restored entry stays live after the next ledger.
        lifetime: u32,
    },
    /// Close the ledger.
    Close,
}

/// Result of closing one simulated ledger.
#[derive(Debug, Clone)]
pub struct ClosedLedger {
    /// Live snapshot before the close.
    pub previous_live: InMemoryLiveSnapshot,
    /// Archive snapshot before the close.
    pub previous_archive: InMemoryArchiveSnapshot,
    /// What moved between tiers.
    pub transitions: TierTransitions,
    /// Live snapshot after the close.
    pub live: InMemoryLiveSnapshot,
    /// Archive snapshot after the close.
    pub archive: InMemoryArchiveSnapshot,
}

/// Simulated two-tier ledger.
#[derive(Debug, Clone)]
pub struct SimulatedLedger {
    live: InMemoryLiveSnapshot,
    archive: InMemoryArchiveSnapshot,
    pending_upserts: BTreeMap<EntryKey, Entry>,
    pending_restores: BTreeMap<EntryKey, u32>,
}

impl SimulatedLedger {
    /// Starts an empty ledger at sequence 1.
    #[must_use]
    pub fn new(protocol: u32) -> Self {
        let header = LedgerHeader::new(1, ProtocolVersion::new(protocol));
        Self {
            live: InMemoryLiveSnapshot::empty(header),
            archive: InMemoryArchiveSnapshot::empty(header),
            pending_upserts: BTreeMap::new(),
            pending_restores: BTreeMap::new(),
        }
    }

    /// Keeps restoration markers in the archive for restored keys.
    #[must_use]
    pub fn with_restoration_markers(mut self, retain: bool) -> Self {
        self.archive = self.archive.clone().with_restoration_markers(retain);
        self
    }

    /// Header of the last closed ledger.
    #[must_use]
    pub fn header(&self) -> LedgerHeader {
        *self.live.header()
    }

    /// Sequence of the last closed ledger.
    #[must_use]
    pub fn ledger_seq(&self) -> u32 {
        self.header().ledger_seq
    }

    /// Current live snapshot.
    #[must_use]
    pub fn live(&self) -> &InMemoryLiveSnapshot {
        &self.live
    }

    /// Current archive snapshot.
    #[must_use]
    pub fn archive(&self) -> &InMemoryArchiveSnapshot {
        &self.archive
    }

    fn next_seq(&self) -> u32 {
        self.ledger_seq().saturating_add(1)
    }

    fn is_staged(&self, key: &EntryKey) -> bool {
        self.pending_upserts.contains_key(key) || self.pending_restores.contains_key(key)
    }

    fn ttl_live_at(&self, key: &EntryKey, seq: u32) -> bool {
        key.ttl_key()
            .and_then(|ttl_key| self.live.get(&ttl_key))
            .and_then(Entry::as_ttl)
            .is_some_and(|ttl| ttl.is_live(seq))
    }

    /// Stages creation of `entry` with a TTL live through `live_until_ledger`.
    ///
    /// Returns `false` (staging nothing) if the key already exists in either
    /// tier or is already staged.
    pub fn create(&mut self, mut entry: Entry, live_until_ledger: u32) -> bool {
        let key = entry.key();
        let exists = self.live.contains(&key) || self.archive.get_archived(&key).is_some();
        if exists || self.is_staged(&key) {
            return false;
        }
        let seq = self.next_seq();
        if let Some(ttl) = Entry::ttl_for(&key, live_until_ledger, seq) {
            self.pending_upserts.insert(ttl.key(), ttl);
        }
        entry.last_modified_ledger = seq;
        self.pending_upserts.insert(key, entry);
        true
    }

    /// Stages a new value for a live entry whose TTL is live at the next ledger.
    ///
    /// Returns `false` (staging nothing) otherwise.
    pub fn update(&mut self, mut entry: Entry) -> bool {
        let key = entry.key();
        let seq = self.next_seq();
        if !self.live.contains(&key) || !self.ttl_live_at(&key, seq) || self.is_staged(&key) {
            return false;
        }
        entry.last_modified_ledger = seq;
        self.pending_upserts.insert(key, entry);
        true
    }

    /// Stages restoration of a persistent entry with a TTL live through
    /// `live_until_ledger`.
    ///
    /// Returns `false` (staging nothing) unless the entry is archived, or
    /// live with an expired TTL.
    pub fn restore(&mut self, key: EntryKey, live_until_ledger: u32) -> bool {
        let seq = self.next_seq();
        let restorable = key.is_persistent()
            && !self.is_staged(&key)
            && (self.archive.get_archived(&key).is_some()
                || (self.live.contains(&key) && !self.ttl_live_at(&key, seq)));
        if restorable {
            self.pending_restores.insert(key, live_until_ledger);
        }
        restorable
    }

    /// Applies one scripted action; `Close` returns the closed ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if closing fails.
    pub fn apply(&mut self, action: &SimAction) -> Result<Option<ClosedLedger>, SnapshotError> {
        let seq = self.next_seq();
        match *action {
            SimAction::Create { seed, durability, val, lifetime } => {
                self.create(contract_data(seed, durability, val, seq), seq + lifetime);
            },
            SimAction::Update { seed, val } => {
                self.update(contract_data(seed, Durability::Persistent, val, seq));
            },
            SimAction::Restore { seed, lifetime } => {
                let key = contract_data(seed, Durability::Persistent, 0, 0).key();
                self.restore(key, seq + lifetime);
            },
            SimAction::Close => return self.close().map(Some),
        }
        Ok(None)
    }

    /// Closes the next ledger.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::SequenceRegression`] if the ledger sequence
    /// cannot advance.
    pub fn close(&mut self) -> Result<ClosedLedger, SnapshotError> {
        let header = self.header();
        let next = header.next().ok_or(SnapshotError::SequenceRegression {
            current: header.ledger_seq,
            attempted: header.ledger_seq,
        })?;
        let seq = next.ledger_seq;
        let evict_persistent =
            next.protocol_version.is_at_least(FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION);

        let mut transitions = TierTransitions::default();
        let mut live_upserts: Vec<Entry> = Vec::new();
        let mut live_deletes: Vec<EntryKey> = Vec::new();
        let mut archived: Vec<Entry> = Vec::new();
        let mut restored_keys: Vec<EntryKey> = Vec::new();
        let mut touched: BTreeSet<EntryKey> = self.pending_upserts.keys().cloned().collect();

        for (key, live_until) in std::mem::take(&mut self.pending_restores) {
            let Some(new_ttl) = Entry::ttl_for(&key, live_until, seq) else {
                continue;
            };
            if let Some(entry) = self.archive.get_archived(&key) {
                let mut restored = entry.clone();
                restored.last_modified_ledger = seq;
                transitions.restored_from_archive.insert(key.clone(), restored.clone());
                transitions.restored_from_archive.insert(new_ttl.key(), new_ttl.clone());
                live_upserts.push(restored);
                restored_keys.push(key.clone());
            } else if let (Some(entry), Some(old_ttl)) =
                (self.live.get(&key), key.ttl_key().and_then(|k| self.live.get(&k)))
            {
                transitions.restored_from_live.insert(key.clone(), entry.clone());
                transitions.restored_from_live.insert(old_ttl.key(), old_ttl.clone());
            } else {
                continue;
            }
            touched.insert(new_ttl.key());
            touched.insert(key);
            live_upserts.push(new_ttl);
        }

        for entry in self.live.iter() {
            let key = entry.key();
            if !key.has_ttl() || touched.contains(&key) {
                continue;
            }
            let Some(ttl_key) = key.ttl_key() else {
                continue;
            };
            if self.ttl_live_at(&key, seq) {
                continue;
            }
            if key.is_temporary() {
                transitions.deleted_keys.push(key.clone());
                transitions.deleted_keys.push(ttl_key.clone());
            } else if evict_persistent {
                transitions.evicted.push(entry.clone());
                transitions.deleted_keys.push(ttl_key.clone());
                archived.push(entry.clone());
            } else {
                continue;
            }
            live_deletes.push(key);
            live_deletes.push(ttl_key);
        }

        live_upserts.extend(std::mem::take(&mut self.pending_upserts).into_values());

        let live = self.live.apply(next, live_upserts, live_deletes)?;
        let archive = self.archive.apply(next, archived, restored_keys)?;
        let previous_live = std::mem::replace(&mut self.live, live.clone());
        let previous_archive = std::mem::replace(&mut self.archive, archive.clone());

        Ok(ClosedLedger { previous_live, previous_archive, transitions, live, archive })
    }
}
