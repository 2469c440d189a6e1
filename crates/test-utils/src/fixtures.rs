//! Entry and snapshot fixtures.
//!
//! Entries built from the same `seed` share a key, so a fixture with a
//! different `val` is a newer (or staler) version of the same entry.

#![allow(clippy::expect_used)]

use tiermark_state::{InMemoryArchiveSnapshot, InMemoryLiveSnapshot};
use tiermark_types::{
    AccountEntry, AccountId, ArchiveEntry, ContractCodeEntry, ContractDataEntry, ContractId,
    Durability, Entry, EntryData, LedgerHeader, Operation, OperationType, ProtocolVersion, sha256,
};

/// Header at `ledger_seq` with the given protocol version.
#[must_use]
pub fn header(ledger_seq: u32, protocol: u32) -> LedgerHeader {
    LedgerHeader::new(ledger_seq, ProtocolVersion::new(protocol))
}

/// Account entry.
#[must_use]
pub fn account(seed: u8, balance: i64) -> Entry {
    Entry::new(
        EntryData::Account(AccountEntry {
            account_id: AccountId::new([seed; 32]),
            balance,
            seq_num: 0,
            num_sub_entries: 0,
            liabilities: None,
        }),
        1,
    )
}

/// Contract data entry with the given durability.
#[must_use]
pub fn contract_data(seed: u8, durability: Durability, val: u8, last_modified: u32) -> Entry {
    Entry::new(
        EntryData::ContractData(ContractDataEntry {
            contract: ContractId::new([seed; 32]),
            key: vec![seed],
            durability,
            val: vec![val],
        }),
        last_modified,
    )
}

/// Persistent contract data entry.
#[must_use]
pub fn persistent_data(seed: u8, val: u8, last_modified: u32) -> Entry {
    contract_data(seed, Durability::Persistent, val, last_modified)
}

/// Temporary contract data entry.
#[must_use]
pub fn temporary_data(seed: u8, val: u8, last_modified: u32) -> Entry {
    contract_data(seed, Durability::Temporary, val, last_modified)
}

/// Contract code entry; always persistent.
#[must_use]
pub fn contract_code(seed: u8, last_modified: u32) -> Entry {
    let code = vec![seed; 16];
    Entry::new(
        EntryData::ContractCode(ContractCodeEntry { hash: sha256(&code), code }),
        last_modified,
    )
}

/// TTL record for `owner`.
///
/// # Panics
///
/// Panics if `owner` is not TTL-governed.
#[must_use]
pub fn ttl_for(owner: &Entry, live_until_ledger: u32, last_modified: u32) -> Entry {
    Entry::ttl_for(&owner.key(), live_until_ledger, last_modified)
        .expect("fixture owner must be a contract data or code entry")
}

/// Operation of the given type from a fixed source account.
#[must_use]
pub fn operation(op_type: OperationType) -> Operation {
    Operation { source_account: AccountId::new([0xAA; 32]), op_type }
}

/// Live snapshot holding `entries`.
#[must_use]
pub fn live_snapshot(header: LedgerHeader, entries: Vec<Entry>) -> InMemoryLiveSnapshot {
    InMemoryLiveSnapshot::new(header, entries)
}

/// Archive snapshot holding `entries` as archived records.
#[must_use]
pub fn archive_snapshot(header: LedgerHeader, entries: Vec<Entry>) -> InMemoryArchiveSnapshot {
    InMemoryArchiveSnapshot::new(header, entries.into_iter().map(ArchiveEntry::Archived))
}
