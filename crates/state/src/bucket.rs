//! Bucket segments of the live store.
//!
//! A bucket is an immutable, key-sorted run of entries produced by the
//! bucket subsystem's merges. This crate does not merge buckets; it only
//! models what a merge hands to bucket-apply checks.

use std::fmt;

use serde::{Deserialize, Serialize};
use tiermark_types::{BucketHasher, EMPTY_HASH, Entry, EntryKey, Hash};

/// One record in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketEntry {
    /// Entry created within the bucket's ledger range.
    Init(Entry),
    /// Entry updated within the bucket's ledger range.
    Live(Entry),
    /// Tombstone for a deleted entry.
    Dead(EntryKey),
}

impl BucketEntry {
    /// Key this record refers to.
    pub fn key(&self) -> EntryKey {
        match self {
            Self::Init(entry) | Self::Live(entry) => entry.key(),
            Self::Dead(key) => key.clone(),
        }
    }

    /// The entry, unless this is a tombstone.
    pub fn entry(&self) -> Option<&Entry> {
        match self {
            Self::Init(entry) | Self::Live(entry) => Some(entry),
            Self::Dead(_) => None,
        }
    }
}

/// Immutable key-sorted bucket with its content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    entries: Vec<BucketEntry>,
    hash: Hash,
}

impl Bucket {
    /// Builds a bucket, sorting by key. For duplicate keys the last record wins.
    pub fn new(entries: impl IntoIterator<Item = BucketEntry>) -> Self {
        let mut keyed: Vec<(EntryKey, BucketEntry)> =
            entries.into_iter().map(|e| (e.key(), e)).collect();
        // Stable sort keeps input order among equal keys.
        keyed.sort_by(|a, b| a.0.cmp(&b.0));

        let mut entries: Vec<BucketEntry> = Vec::with_capacity(keyed.len());
        let mut last_key: Option<EntryKey> = None;
        for (key, entry) in keyed {
            if last_key.as_ref() == Some(&key) {
                if let Some(slot) = entries.last_mut() {
                    *slot = entry;
                }
                continue;
            }
            entries.push(entry);
            last_key = Some(key);
        }

        let mut hasher = BucketHasher::new();
        for entry in &entries {
            match entry {
                BucketEntry::Init(e) | BucketEntry::Live(e) => hasher.add_entry(e),
                BucketEntry::Dead(key) => hasher.add_tombstone(key),
            }
        }
        Self { entries, hash: hasher.finalize() }
    }

    /// An empty bucket.
    pub fn empty() -> Self {
        Self { entries: Vec::new(), hash: EMPTY_HASH }
    }

    /// Content hash.
    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    /// Records in key order.
    pub fn entries(&self) -> &[BucketEntry] {
        &self.entries
    }

    /// Looks up the record for `key`.
    pub fn get(&self, key: &EntryKey) -> Option<&BucketEntry> {
        self.entries.binary_search_by(|e| e.key().cmp(key)).ok().map(|i| &self.entries[i])
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bucket holds no records.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Contiguous range of ledgers a bucket covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRange {
    /// First ledger in the range.
    pub first: u32,
    /// Number of ledgers in the range.
    pub count: u32,
}

impl LedgerRange {
    /// Creates a range.
    pub const fn new(first: u32, count: u32) -> Self {
        Self { first, count }
    }

    /// Last ledger in the range, or `None` if the range is empty.
    pub fn last(&self) -> Option<u32> {
        self.count.checked_sub(1).and_then(|n| self.first.checked_add(n))
    }

    /// Whether `ledger_seq` falls in the range.
    pub fn contains(&self, ledger_seq: u32) -> bool {
        self.last().is_some_and(|last| (self.first..=last).contains(&ledger_seq))
    }
}

/// Position of a bucket in the bucket list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketLevel {
    /// Level index, 0 being the most recent.
    pub level: u32,
    /// Whether this is the level's `curr` bucket (as opposed to `snap`).
    pub is_curr: bool,
}

impl fmt::Display for BucketLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", if self.is_curr { "Curr" } else { "Snap" }, self.level)
    }
}
