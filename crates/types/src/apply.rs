//! Inputs handed to checkers by the ledger-apply pipeline.
//!
//! The apply engine owns how these are produced. This module only fixes
//! their shape.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    protocol::LedgerHeader,
    types::{AccountId, ContractId, Entry, EntryKey},
};

/// Kind of an applied operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    /// Create and fund a new account.
    CreateAccount,
    /// Transfer an asset between accounts.
    Payment,
    /// Create, update or delete an offer.
    ManageOffer,
    /// Set or clear an account data entry.
    ManageData,
    /// Invoke a contract function.
    InvokeHostFunction,
    /// Extend the TTL of a footprint.
    ExtendFootprintTtl,
    /// Restore an archived or expired footprint.
    RestoreFootprint,
}

impl OperationType {
    /// Stable name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::CreateAccount => "create_account",
            Self::Payment => "payment",
            Self::ManageOffer => "manage_offer",
            Self::ManageData => "manage_data",
            Self::InvokeHostFunction => "invoke_host_function",
            Self::ExtendFootprintTtl => "extend_footprint_ttl",
            Self::RestoreFootprint => "restore_footprint",
        }
    }
}

/// An operation as applied by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Account the operation acts on behalf of.
    pub source_account: AccountId,
    /// Operation kind.
    pub op_type: OperationType,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{type: {}, source: {}}}", self.op_type.name(), self.source_account)
    }
}

/// Outcome of an applied operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationResult {
    /// The operation succeeded.
    Success,
    /// The operation failed; its effects were rolled back.
    Failed {
        /// Result code reported by the engine.
        code: String,
    },
}

impl OperationResult {
    /// Whether the operation succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Before and after values of one entry touched by an operation.
///
/// `previous == None` is a creation, `current == None` a deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDelta {
    /// Value before the operation.
    pub previous: Option<Entry>,
    /// Value after the operation.
    pub current: Option<Entry>,
}

impl EntryDelta {
    /// Whether this delta creates the entry.
    pub const fn is_created(&self) -> bool {
        self.previous.is_none() && self.current.is_some()
    }

    /// Whether this delta deletes the entry.
    pub const fn is_deleted(&self) -> bool {
        self.previous.is_some() && self.current.is_none()
    }
}

/// Before and after headers of the ledger an operation runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderDelta {
    /// Header before the operation.
    pub previous: LedgerHeader,
    /// Header after the operation.
    pub current: LedgerHeader,
}

/// Everything one operation changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDelta {
    /// Header change.
    pub header: HeaderDelta,
    /// Per-key entry changes.
    pub entries: BTreeMap<EntryKey, EntryDelta>,
}

impl LedgerDelta {
    /// Creates a delta with no entry changes.
    pub fn new(header: LedgerHeader) -> Self {
        Self { header: HeaderDelta { previous: header, current: header }, entries: BTreeMap::new() }
    }

    /// Records the change of one entry.
    ///
    /// The key is taken from whichever side is present; a delta with neither
    /// side is ignored.
    pub fn record(&mut self, previous: Option<Entry>, current: Option<Entry>) {
        let Some(key) = current.as_ref().or(previous.as_ref()).map(Entry::key) else {
            return;
        };
        self.entries.insert(key, EntryDelta { previous, current });
    }

    /// Keys of entries this delta creates.
    pub fn created_keys(&self) -> impl Iterator<Item = &EntryKey> {
        self.entries.iter().filter(|(_, d)| d.is_created()).map(|(k, _)| k)
    }

    /// Keys of entries this delta deletes.
    pub fn deleted_keys(&self) -> impl Iterator<Item = &EntryKey> {
        self.entries.iter().filter(|(_, d)| d.is_deleted()).map(|(k, _)| k)
    }
}

/// Event emitted by a contract during an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEvent {
    /// Emitting contract; `None` for system events.
    pub contract: Option<ContractId>,
    /// Event topics.
    pub topics: Vec<Vec<u8>>,
    /// Event payload.
    pub data: Vec<u8>,
}

/// Tier transitions of one closed ledger, as reported by the apply pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTransitions {
    /// Persistent entries moved from live state to the archive.
    pub evicted: Vec<Entry>,
    /// Keys removed from live state: data entries and their TTL records,
    /// both persistent and temporary.
    pub deleted_keys: Vec<EntryKey>,
    /// Entries restored from the archive, with their TTL records.
    pub restored_from_archive: BTreeMap<EntryKey, Entry>,
    /// Expired-but-not-evicted entries restored in place, with their TTL records.
    pub restored_from_live: BTreeMap<EntryKey, Entry>,
}

impl TierTransitions {
    /// Whether the ledger moved nothing between tiers.
    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty()
            && self.deleted_keys.is_empty()
            && self.restored_from_archive.is_empty()
            && self.restored_from_live.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::{
        protocol::ProtocolVersion,
        types::{AccountEntry, EntryData},
    };

    fn account(seed: u8, balance: i64) -> Entry {
        Entry::new(
            EntryData::Account(AccountEntry {
                account_id: AccountId::new([seed; 32]),
                balance,
                seq_num: 1,
                num_sub_entries: 0,
                liabilities: None,
            }),
            3,
        )
    }

    #[test]
    fn test_ledger_delta_classifies_changes() {
        let mut delta = LedgerDelta::new(LedgerHeader::new(5, ProtocolVersion::new(23)));
        delta.record(None, Some(account(1, 10)));
        delta.record(Some(account(2, 10)), None);
        delta.record(Some(account(3, 10)), Some(account(3, 20)));
        delta.record(None, None);

        assert_eq!(delta.entries.len(), 3);
        assert_eq!(delta.created_keys().cloned().collect::<Vec<_>>(), vec![account(1, 0).key()]);
        assert_eq!(delta.deleted_keys().cloned().collect::<Vec<_>>(), vec![account(2, 0).key()]);
    }

    #[test]
    fn test_tier_transitions_empty() {
        let mut transitions = TierTransitions::default();
        assert!(transitions.is_empty());
        transitions.deleted_keys.push(account(1, 0).key());
        assert!(!transitions.is_empty());
    }

    #[test]
    fn test_operation_display() {
        let op = Operation {
            source_account: AccountId::new([0xab; 32]),
            op_type: OperationType::RestoreFootprint,
        };
        assert_eq!(op.to_string(), "{type: restore_footprint, source: account:abababab}");
    }
}
