//! Point-in-time views over the live and archive stores.
//!
//! A snapshot is immutable once captured. Closing a ledger produces a new
//! snapshot that supersedes the old one; readers holding the old handle keep
//! a consistent view for as long as they need it.
//!
//! Both stores expose the same two access paths:
//! - batched key lookup, where keys without an entry are silently omitted
//! - full iteration in key order, for startup merge-scans

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use tiermark_types::{ArchiveEntry, Entry, EntryKey, LedgerHeader};

use crate::error::{Result, SnapshotError};

/// Iterator over live entries in key order.
pub type EntryIter<'a> = Box<dyn Iterator<Item = Result<Entry>> + 'a>;

/// Iterator over archive records in key order.
pub type ArchiveIter<'a> = Box<dyn Iterator<Item = Result<ArchiveEntry>> + 'a>;

/// Read-only view over the live store at one ledger.
pub trait LiveSnapshot: Send + Sync {
    /// Header of the ledger this snapshot was captured at.
    fn header(&self) -> &LedgerHeader;

    /// Sequence of the ledger this snapshot was captured at.
    fn ledger_seq(&self) -> u32 {
        self.header().ledger_seq
    }

    /// Loads every entry whose key is in `keys`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load_keys(&self, keys: &BTreeSet<EntryKey>) -> Result<Vec<Entry>>;

    /// Iterates every entry in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if iteration cannot start; per-item errors are
    /// yielded by the iterator.
    fn entries(&self) -> Result<EntryIter<'_>>;
}

/// Read-only view over the archive store at one ledger.
pub trait ArchiveSnapshot: Send + Sync {
    /// Header of the ledger this snapshot was captured at.
    fn header(&self) -> &LedgerHeader;

    /// Sequence of the ledger this snapshot was captured at.
    fn ledger_seq(&self) -> u32 {
        self.header().ledger_seq
    }

    /// Loads every record whose key is in `keys`, restoration markers included.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load_keys(&self, keys: &BTreeSet<EntryKey>) -> Result<Vec<ArchiveEntry>>;

    /// Iterates every record in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if iteration cannot start.
    fn entries(&self) -> Result<ArchiveIter<'_>>;
}

/// Shared handle to a live snapshot.
pub type LiveSnapshotRef = Arc<dyn LiveSnapshot>;

/// Shared handle to an archive snapshot.
pub type ArchiveSnapshotRef = Arc<dyn ArchiveSnapshot>;

fn check_advances(current: &LedgerHeader, next: &LedgerHeader) -> Result<()> {
    if next.ledger_seq <= current.ledger_seq {
        return Err(SnapshotError::SequenceRegression {
            current: current.ledger_seq,
            attempted: next.ledger_seq,
        });
    }
    Ok(())
}

/// Live snapshot held entirely in memory.
///
/// Cloning is cheap: the entry map is shared.
#[derive(Debug, Clone)]
pub struct InMemoryLiveSnapshot {
    header: LedgerHeader,
    entries: Arc<BTreeMap<EntryKey, Entry>>,
}

impl InMemoryLiveSnapshot {
    /// Creates a snapshot from its entries. Later duplicates of a key win.
    pub fn new(header: LedgerHeader, entries: impl IntoIterator<Item = Entry>) -> Self {
        let entries = entries.into_iter().map(|e| (e.key(), e)).collect();
        Self { header, entries: Arc::new(entries) }
    }

    /// Creates an empty snapshot.
    pub fn empty(header: LedgerHeader) -> Self {
        Self { header, entries: Arc::new(BTreeMap::new()) }
    }

    /// Looks up a single entry.
    pub fn get(&self, key: &EntryKey) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Whether `key` has an entry.
    pub fn contains(&self, key: &EntryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in key order without the fallible wrapper.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Produces the snapshot for a later ledger.
    ///
    /// Deletions are applied before upserts. `self` is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::SequenceRegression`] if `header` does not
    /// advance past this snapshot's ledger.
    pub fn apply(
        &self,
        header: LedgerHeader,
        upserts: impl IntoIterator<Item = Entry>,
        deletes: impl IntoIterator<Item = EntryKey>,
    ) -> Result<Self> {
        check_advances(&self.header, &header)?;
        let mut entries = (*self.entries).clone();
        for key in deletes {
            entries.remove(&key);
        }
        for entry in upserts {
            entries.insert(entry.key(), entry);
        }
        Ok(Self { header, entries: Arc::new(entries) })
    }
}

impl LiveSnapshot for InMemoryLiveSnapshot {
    fn header(&self) -> &LedgerHeader {
        &self.header
    }

    fn load_keys(&self, keys: &BTreeSet<EntryKey>) -> Result<Vec<Entry>> {
        Ok(keys.iter().filter_map(|k| self.entries.get(k)).cloned().collect())
    }

    fn entries(&self) -> Result<EntryIter<'_>> {
        Ok(Box::new(self.entries.values().cloned().map(Ok)))
    }
}

/// Archive snapshot held entirely in memory.
#[derive(Debug, Clone)]
pub struct InMemoryArchiveSnapshot {
    header: LedgerHeader,
    entries: Arc<BTreeMap<EntryKey, ArchiveEntry>>,
    retain_restoration_markers: bool,
}

impl InMemoryArchiveSnapshot {
    /// Creates a snapshot from its records. Later duplicates of a key win.
    pub fn new(header: LedgerHeader, records: impl IntoIterator<Item = ArchiveEntry>) -> Self {
        let entries = records.into_iter().map(|r| (r.key(), r)).collect();
        Self { header, entries: Arc::new(entries), retain_restoration_markers: false }
    }

    /// Creates an empty snapshot.
    pub fn empty(header: LedgerHeader) -> Self {
        Self::new(header, [])
    }

    /// Leaves a [`ArchiveEntry::Live`] marker behind for restored keys
    /// instead of dropping them.
    #[must_use]
    pub fn with_restoration_markers(mut self, retain: bool) -> Self {
        self.retain_restoration_markers = retain;
        self
    }

    /// Looks up a single record.
    pub fn get(&self, key: &EntryKey) -> Option<&ArchiveEntry> {
        self.entries.get(key)
    }

    /// Looks up a single archived entry, skipping restoration markers.
    pub fn get_archived(&self, key: &EntryKey) -> Option<&Entry> {
        self.entries.get(key).and_then(ArchiveEntry::archived)
    }

    /// Number of records, markers included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot holds no records.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates records in key order without the fallible wrapper.
    pub fn iter(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.values()
    }

    /// Produces the snapshot for a later ledger.
    ///
    /// `restored` keys leave the archive (or become markers), then
    /// `archived` entries are added.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::SequenceRegression`] if `header` does not
    /// advance past this snapshot's ledger.
    pub fn apply(
        &self,
        header: LedgerHeader,
        archived: impl IntoIterator<Item = Entry>,
        restored: impl IntoIterator<Item = EntryKey>,
    ) -> Result<Self> {
        check_advances(&self.header, &header)?;
        let mut entries = (*self.entries).clone();
        for key in restored {
            if self.retain_restoration_markers {
                entries.insert(key.clone(), ArchiveEntry::Live(key));
            } else {
                entries.remove(&key);
            }
        }
        for entry in archived {
            entries.insert(entry.key(), ArchiveEntry::Archived(entry));
        }
        Ok(Self {
            header,
            entries: Arc::new(entries),
            retain_restoration_markers: self.retain_restoration_markers,
        })
    }
}

impl ArchiveSnapshot for InMemoryArchiveSnapshot {
    fn header(&self) -> &LedgerHeader {
        &self.header
    }

    fn load_keys(&self, keys: &BTreeSet<EntryKey>) -> Result<Vec<ArchiveEntry>> {
        Ok(keys.iter().filter_map(|k| self.entries.get(k)).cloned().collect())
    }

    fn entries(&self) -> Result<ArchiveIter<'_>> {
        Ok(Box::new(self.entries.values().cloned().map(Ok)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use tiermark_types::{
        ContractDataEntry, ContractId, Durability, EntryData, ProtocolVersion,
    };

    use super::*;

    fn header(seq: u32) -> LedgerHeader {
        LedgerHeader::new(seq, ProtocolVersion::new(23))
    }

    fn data(seed: u8, val: u8) -> Entry {
        Entry::new(
            EntryData::ContractData(ContractDataEntry {
                contract: ContractId::new([seed; 32]),
                key: vec![seed],
                durability: Durability::Persistent,
                val: vec![val],
            }),
            1,
        )
    }

    #[test]
    fn test_load_keys_omits_missing() {
        let live = InMemoryLiveSnapshot::new(header(1), [data(1, 0), data(2, 0)]);
        let keys: BTreeSet<_> = [data(1, 0).key(), data(9, 0).key()].into_iter().collect();
        let loaded = live.load_keys(&keys).unwrap();
        assert_eq!(loaded, vec![data(1, 0)]);
    }

    #[test]
    fn test_entries_iterate_in_key_order() {
        let live = InMemoryLiveSnapshot::new(header(1), [data(3, 0), data(1, 0), data(2, 0)]);
        let keys: Vec<_> = live.entries().unwrap().map(|e| e.unwrap().key()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_apply_leaves_previous_snapshot_untouched() {
        let before = InMemoryLiveSnapshot::new(header(1), [data(1, 0), data(2, 0)]);
        let after = before.apply(header(2), [data(1, 7)], [data(2, 0).key()]).unwrap();

        assert_eq!(before.len(), 2);
        assert_eq!(before.get(&data(1, 0).key()), Some(&data(1, 0)));
        assert_eq!(after.len(), 1);
        assert_eq!(after.get(&data(1, 0).key()), Some(&data(1, 7)));
        assert_eq!(after.ledger_seq(), 2);
    }

    #[test]
    fn test_apply_rejects_sequence_regression() {
        let live = InMemoryLiveSnapshot::empty(header(5));
        let err = live.apply(header(5), [], []).unwrap_err();
        assert!(matches!(err, SnapshotError::SequenceRegression { current: 5, attempted: 5 }));

        let archive = InMemoryArchiveSnapshot::empty(header(5));
        assert!(archive.apply(header(4), [], []).is_err());
    }

    #[test]
    fn test_archive_restore_drops_key_by_default() {
        let archive = InMemoryArchiveSnapshot::empty(header(1))
            .apply(header(2), [data(1, 0)], [])
            .unwrap();
        assert!(archive.get_archived(&data(1, 0).key()).is_some());

        let restored = archive.apply(header(3), [], [data(1, 0).key()]).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn test_archive_restore_can_leave_marker() {
        let archive = InMemoryArchiveSnapshot::empty(header(1))
            .with_restoration_markers(true)
            .apply(header(2), [data(1, 0)], [])
            .unwrap();
        let restored = archive.apply(header(3), [], [data(1, 0).key()]).unwrap();

        assert_eq!(restored.get(&data(1, 0).key()), Some(&ArchiveEntry::Live(data(1, 0).key())));
        assert!(restored.get_archived(&data(1, 0).key()).is_none());

        let keys: BTreeSet<_> = [data(1, 0).key()].into_iter().collect();
        assert_eq!(restored.load_keys(&keys).unwrap().len(), 1);
    }

    proptest::proptest! {
        #[test]
        fn test_apply_matches_model(
            initial in proptest::collection::btree_map(0u8..16, 0u8..4, 0..16),
            upserts in proptest::collection::btree_map(0u8..16, 0u8..4, 0..8),
            deletes in proptest::collection::btree_set(0u8..16, 0..8),
        ) {
            let before = InMemoryLiveSnapshot::new(
                header(1),
                initial.iter().map(|(&seed, &val)| data(seed, val)),
            );
            let after = before
                .apply(
                    header(2),
                    upserts.iter().map(|(&seed, &val)| data(seed, val)),
                    deletes.iter().map(|&seed| data(seed, 0).key()),
                )
                .unwrap();

            // Deletes apply before upserts.
            let mut model = initial.clone();
            for seed in &deletes {
                model.remove(seed);
            }
            model.extend(upserts.iter().map(|(&k, &v)| (k, v)));
            proptest::prop_assert_eq!(after.len(), model.len());
            for (&seed, &val) in &model {
                proptest::prop_assert_eq!(after.get(&data(seed, 0).key()), Some(&data(seed, val)));
            }
            proptest::prop_assert_eq!(before.len(), initial.len());
        }
    }
}
