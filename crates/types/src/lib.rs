//! Core types, errors, and primitives for Tiermark.
//!
//! This crate provides the foundational types shared by the snapshot layer
//! and the invariant framework:
//! - Ledger entries, entry keys and TTL records
//! - Protocol-version gates and the ledger header
//! - Apply-pipeline inputs (operation deltas, tier transitions)
//! - SHA-256 hashing, including TTL-key derivation
//! - postcard codec, configuration, and the error-code catalog

#![deny(unsafe_code)]

pub mod apply;
pub mod codec;
pub mod config;
pub mod error;
pub mod hash;
pub mod protocol;
pub mod types;

// Re-export commonly used types at crate root
pub use apply::{
    ContractEvent, EntryDelta, HeaderDelta, LedgerDelta, Operation, OperationResult,
    OperationType, TierTransitions,
};
pub use codec::{CodecError, decode, encode};
pub use error::ErrorCode;
pub use hash::{BucketHasher, EMPTY_HASH, Hash, entry_key_hash, sha256, short_hex, to_hex};
pub use protocol::{
    FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION, FIRST_PROTOCOL_WITH_EVICTION_VALUE_FIX,
    FIRST_PROTOCOL_WITH_LIABILITIES, FIRST_PROTOCOL_WITH_OPERATION_INVARIANTS, LedgerHeader,
    ProtocolVersion,
};
pub use types::*;
