//! Cryptographic hashing functions for Tiermark.
//!
//! All hashing uses SHA-256. This module provides:
//! - Basic SHA-256 hashing
//! - Canonical entry-key hashing (the derivation behind TTL keys)
//! - Streaming bucket hashing over sorted entries

use std::fmt::Write;

use sha2::{Digest, Sha256};

use crate::types::{Asset, Durability, Entry, EntryData, EntryExt, EntryKey, Liabilities};

/// SHA-256 hash output (32 bytes).
pub type Hash = [u8; 32];

/// Hash of empty input: SHA-256("").
/// Used for empty buckets. NOT zero bytes.
pub const EMPTY_HASH: Hash = [
    0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f, 0xb9, 0x24,
    0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b, 0x78, 0x52, 0xb8, 0x55,
];

/// Compute SHA-256 hash of arbitrary data.
#[inline]
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Lowercase hex encoding of arbitrary bytes.
pub fn to_hex(data: &[u8]) -> String {
    data.iter().fold(String::with_capacity(data.len() * 2), |mut acc, b| {
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

/// First four bytes of a hash in hex, for log-friendly identifiers.
pub fn short_hex(hash: &Hash) -> String {
    to_hex(&hash[..4])
}

/// Computes the canonical hash of an entry key.
///
/// This is the hash a TTL record stores to point back at its owner, so the
/// encoding is consensus-critical: every node must derive identical bytes.
///
/// Encoding: one type byte, then each field in declaration order with
/// fixed-width integers big-endian and variable-length fields prefixed
/// with a `u32` little-endian length.
pub fn entry_key_hash(key: &EntryKey) -> Hash {
    let mut hasher = Sha256::new();
    hash_entry_key(&mut hasher, key);
    hasher.finalize().into()
}

/// Hash a single entry key into the hasher.
fn hash_entry_key(hasher: &mut Sha256, key: &EntryKey) {
    match key {
        EntryKey::Account { account_id } => {
            hasher.update([0x00]);
            hasher.update(account_id.as_bytes());
        },
        EntryKey::Trustline { account_id, asset } => {
            hasher.update([0x01]);
            hasher.update(account_id.as_bytes());
            hash_asset(hasher, asset);
        },
        EntryKey::Offer { seller_id, offer_id } => {
            hasher.update([0x02]);
            hasher.update(seller_id.as_bytes());
            hasher.update(offer_id.value().to_be_bytes());
        },
        EntryKey::Data { account_id, name } => {
            hasher.update([0x03]);
            hasher.update(account_id.as_bytes());
            hash_length_prefixed_bytes(hasher, name.as_bytes());
        },
        EntryKey::ClaimableBalance { balance_id } => {
            hasher.update([0x04]);
            hasher.update(balance_id.as_bytes());
        },
        EntryKey::ContractData { contract, key, durability } => {
            hasher.update([0x05]);
            hasher.update(contract.as_bytes());
            hash_length_prefixed_bytes(hasher, key);
            hasher.update([durability_byte(*durability)]);
        },
        EntryKey::ContractCode { hash } => {
            hasher.update([0x06]);
            hasher.update(hash);
        },
        EntryKey::Ttl { key_hash } => {
            hasher.update([0x07]);
            hasher.update(key_hash);
        },
    }
}

fn hash_asset(hasher: &mut Sha256, asset: &Asset) {
    match asset {
        Asset::Native => hasher.update([0x00]),
        Asset::Credit { code, issuer } => {
            hasher.update([0x01]);
            hash_length_prefixed_bytes(hasher, code.as_bytes());
            hasher.update(issuer.as_bytes());
        },
    }
}

fn hash_liabilities(hasher: &mut Sha256, liabilities: Option<Liabilities>) {
    match liabilities {
        None => hasher.update([0x00]),
        Some(l) => {
            hasher.update([0x01]);
            hasher.update(l.buying.to_be_bytes());
            hasher.update(l.selling.to_be_bytes());
        },
    }
}

fn durability_byte(durability: Durability) -> u8 {
    match durability {
        Durability::Temporary => 0x00,
        Durability::Persistent => 0x01,
    }
}

/// Hash the value side of an entry (data + extension + last-modified).
fn hash_entry(hasher: &mut Sha256, entry: &Entry) {
    hasher.update(entry.last_modified_ledger.to_be_bytes());
    match &entry.data {
        EntryData::Account(a) => {
            hasher.update(a.balance.to_be_bytes());
            hasher.update(a.seq_num.to_be_bytes());
            hasher.update(a.num_sub_entries.to_be_bytes());
            hash_liabilities(hasher, a.liabilities);
        },
        EntryData::Trustline(t) => {
            hasher.update(t.balance.to_be_bytes());
            hasher.update(t.limit.to_be_bytes());
            hasher.update(t.flags.to_be_bytes());
            hash_liabilities(hasher, t.liabilities);
        },
        EntryData::Offer(o) => {
            hash_asset(hasher, &o.selling);
            hash_asset(hasher, &o.buying);
            hasher.update(o.amount.to_be_bytes());
            hasher.update(o.price.n.to_be_bytes());
            hasher.update(o.price.d.to_be_bytes());
        },
        EntryData::Data(d) => hash_length_prefixed_bytes(hasher, &d.value),
        EntryData::ClaimableBalance(c) => hasher.update(c.amount.to_be_bytes()),
        EntryData::ContractData(c) => hash_length_prefixed_bytes(hasher, &c.val),
        EntryData::ContractCode(c) => hash_length_prefixed_bytes(hasher, &c.code),
        EntryData::Ttl(t) => hasher.update(t.live_until_ledger.to_be_bytes()),
    }
    match &entry.ext {
        EntryExt::V0 => hasher.update([0x00]),
        EntryExt::V1 { sponsor } => {
            hasher.update([0x01]);
            match sponsor {
                None => hasher.update([0x00]),
                Some(id) => {
                    hasher.update([0x01]);
                    hasher.update(id.as_bytes());
                },
            }
        },
    }
}

/// Hash length-prefixed bytes.
#[inline]
fn hash_length_prefixed_bytes(hasher: &mut Sha256, data: &[u8]) {
    hasher.update((data.len() as u32).to_le_bytes());
    hasher.update(data);
}

/// Streaming hasher for bucket content hashes.
///
/// Entries must be fed in key order; a deleted key is hashed as a
/// tombstone so that two buckets differing only in deletions hash apart.
pub struct BucketHasher {
    hasher: Sha256,
    has_entries: bool,
}

impl BucketHasher {
    /// Create a new bucket hasher.
    pub fn new() -> Self {
        Self { hasher: Sha256::new(), has_entries: false }
    }

    /// Add a live or initialized entry to the bucket hash.
    pub fn add_entry(&mut self, entry: &Entry) {
        self.has_entries = true;
        self.hasher.update([0x01]);
        hash_entry_key(&mut self.hasher, &entry.key());
        hash_entry(&mut self.hasher, entry);
    }

    /// Add a deletion marker to the bucket hash.
    pub fn add_tombstone(&mut self, key: &EntryKey) {
        self.has_entries = true;
        self.hasher.update([0x02]);
        hash_entry_key(&mut self.hasher, key);
    }

    /// Finalize and return the bucket hash.
    ///
    /// Returns EMPTY_HASH for empty buckets.
    pub fn finalize(self) -> Hash {
        if self.has_entries { self.hasher.finalize().into() } else { EMPTY_HASH }
    }
}

impl Default for BucketHasher {
    fn default() -> Self {
        Self::new()
    }
}
