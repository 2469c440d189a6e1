//! TTL records are created and deleted together with their owners.

use std::collections::BTreeSet;

use tiermark_types::{
    ContractEvent, EntryKey, FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION, LedgerDelta, Operation,
    OperationResult,
};

use crate::{error::CheckResult, invariant::Invariant};

/// Checks that an operation never creates or deletes a contract entry
/// without its TTL record, or a TTL record without its owner.
///
/// Non-strict.
#[derive(Debug, Clone, Copy, Default)]
pub struct TtlEntriesMatchOwners;

impl TtlEntriesMatchOwners {
    /// Registered name.
    pub const NAME: &'static str = "TtlEntriesMatchOwners";

    fn check_side<'a>(verb: &str, keys: impl Iterator<Item = &'a EntryKey>) -> String {
        let keys: BTreeSet<&EntryKey> = keys.collect();
        let mut owned_ttls = BTreeSet::new();
        for key in keys.iter().filter(|key| key.has_ttl()) {
            let Some(ttl_key) = key.ttl_key() else {
                continue;
            };
            if !keys.contains(&ttl_key) {
                return format!("{verb} {key} without its TTL {ttl_key}");
            }
            owned_ttls.insert(ttl_key);
        }
        if let Some(orphan) = keys.iter().find(|key| key.is_ttl() && !owned_ttls.contains(**key)) {
            return format!("{verb} TTL {orphan} without its owner");
        }
        String::new()
    }
}

impl Invariant for TtlEntriesMatchOwners {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_strict(&self) -> bool {
        false
    }

    fn check_on_operation_apply(
        &self,
        _operation: &Operation,
        _result: &OperationResult,
        delta: &LedgerDelta,
        _events: &[ContractEvent],
    ) -> CheckResult {
        let protocol_version = delta.header.current.protocol_version;
        if protocol_version.is_before(FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION) {
            return Ok(String::new());
        }
        let created = Self::check_side("Created", delta.created_keys());
        if !created.is_empty() {
            return Ok(created);
        }
        Ok(Self::check_side("Deleted", delta.deleted_keys()))
    }
}
