//! Protocol versions and the ledger header.
//!
//! Several checks change behavior at fixed protocol versions, either
//! because the data they need only exists from some version on, or because
//! a historical bug was fixed at that version and older ledgers must still
//! replay.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ledger protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(u32);

impl ProtocolVersion {
    /// Creates a protocol version from its raw number.
    #[inline]
    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    /// Returns the raw version number.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Whether this version predates `gate`.
    #[inline]
    pub const fn is_before(self, gate: ProtocolVersion) -> bool {
        self.0 < gate.0
    }

    /// Whether this version is `gate` or later.
    #[inline]
    pub const fn is_at_least(self, gate: ProtocolVersion) -> bool {
        self.0 >= gate.0
    }
}

impl From<u32> for ProtocolVersion {
    #[inline]
    fn from(version: u32) -> Self {
        Self(version)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol {}", self.0)
    }
}

/// First protocol whose ledger deltas carry what operation-apply checks need.
///
/// Operation-apply checks other than event consistency are skipped before it.
pub const FIRST_PROTOCOL_WITH_OPERATION_INVARIANTS: ProtocolVersion = ProtocolVersion::new(8);

/// First protocol in which accounts and trustlines track liabilities.
pub const FIRST_PROTOCOL_WITH_LIABILITIES: ProtocolVersion = ProtocolVersion::new(10);

/// First protocol that moves expired persistent entries to the archive.
pub const FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION: ProtocolVersion =
    ProtocolVersion::new(23);

/// First protocol in which eviction always writes the current live value.
///
/// Earlier protocols could archive a stale version of an entry modified in
/// the same ledger, so value equality is only enforced from here on.
pub const FIRST_PROTOCOL_WITH_EVICTION_VALUE_FIX: ProtocolVersion = ProtocolVersion::new(24);

/// Header of a closed ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHeader {
    /// Sequence number of the ledger.
    pub ledger_seq: u32,
    /// Protocol version the ledger was closed under.
    pub protocol_version: ProtocolVersion,
    /// Reserve, in stroops, each account and sub-entry must hold.
    pub base_reserve: u32,
}

impl LedgerHeader {
    /// Base reserve used when none is given.
    pub const DEFAULT_BASE_RESERVE: u32 = 5_000_000;

    /// Creates a header with the default base reserve.
    pub const fn new(ledger_seq: u32, protocol_version: ProtocolVersion) -> Self {
        Self { ledger_seq, protocol_version, base_reserve: Self::DEFAULT_BASE_RESERVE }
    }

    /// Replaces the base reserve.
    #[must_use]
    pub const fn with_base_reserve(mut self, base_reserve: u32) -> Self {
        self.base_reserve = base_reserve;
        self
    }

    /// Minimum native balance for an account owning `num_sub_entries` sub-entries.
    pub const fn minimum_balance(&self, num_sub_entries: u32) -> i64 {
        (2 + num_sub_entries as i64) * self.base_reserve as i64
    }

    /// Header for the next ledger under the same protocol.
    ///
    /// Returns `None` if the sequence number would overflow.
    pub fn next(&self) -> Option<Self> {
        Some(Self { ledger_seq: self.ledger_seq.checked_add(1)?, ..*self })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_gates_are_ordered() {
        assert!(FIRST_PROTOCOL_WITH_OPERATION_INVARIANTS < FIRST_PROTOCOL_WITH_LIABILITIES);
        assert!(FIRST_PROTOCOL_WITH_LIABILITIES < FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION);
        assert!(
            FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION < FIRST_PROTOCOL_WITH_EVICTION_VALUE_FIX
        );
    }

    #[test]
    fn test_is_before_and_is_at_least_partition() {
        let gate = FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION;
        assert!(ProtocolVersion::new(22).is_before(gate));
        assert!(!ProtocolVersion::new(23).is_before(gate));
        assert!(ProtocolVersion::new(23).is_at_least(gate));
        assert!(ProtocolVersion::new(30).is_at_least(gate));
    }

    #[test]
    fn test_header_next() {
        let header = LedgerHeader::new(41, ProtocolVersion::new(23));
        assert_eq!(header.next(), Some(LedgerHeader::new(42, ProtocolVersion::new(23))));
        assert_eq!(LedgerHeader::new(u32::MAX, ProtocolVersion::new(23)).next(), None);
    }

    #[test]
    fn test_minimum_balance() {
        let header = LedgerHeader::new(1, ProtocolVersion::new(10)).with_base_reserve(100);
        assert_eq!(header.minimum_balance(0), 200);
        assert_eq!(header.minimum_balance(3), 500);
        assert_eq!(header.next().unwrap().base_reserve, 100);
    }

    #[test]
    fn test_display() {
        assert_eq!(ProtocolVersion::new(24).to_string(), "protocol 24");
    }
}
