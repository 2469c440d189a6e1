//! Proptest strategies for Tiermark domain types.
//!
//! Two families: free-form values that explore malformed inputs (for
//! never-panic properties) and simulated ledger histories that are correct
//! by construction (for always-accepted properties).
//!
//! # Usage
//!
//! ```no_run
//! use proptest::prelude::*;
//! use tiermark_test_utils::strategies;
//!
//! proptest! {
//!     #[test]
//!     fn my_property(actions in strategies::arb_sim_actions(64)) {
//!         // replay `actions` through a SimulatedLedger
//!     }
//! }
//! ```

use proptest::prelude::*;
use tiermark_types::{
    AccountEntry, AccountId, ContractCodeEntry, ContractDataEntry, ContractId, Durability, Entry,
    EntryData, EntryKey, TierTransitions, sha256,
};

use crate::simulated::SimAction;

/// Seeds used by simulated histories; small so actions collide on keys.
const SEED_RANGE: std::ops::Range<u8> = 0..8;

/// Lifetimes used by simulated histories; short so entries expire often.
const LIFETIME_RANGE: std::ops::Range<u32> = 0..6;

/// Either durability.
pub fn arb_durability() -> impl Strategy<Value = Durability> {
    prop_oneof![Just(Durability::Temporary), Just(Durability::Persistent)]
}

/// A ledger sequence near the start of history.
pub fn arb_ledger_seq() -> impl Strategy<Value = u32> {
    1u32..64
}

/// An entry key of any TTL-relevant type, plus accounts.
pub fn arb_entry_key() -> impl Strategy<Value = EntryKey> {
    prop_oneof![
        any::<u8>().prop_map(|seed| EntryKey::Account { account_id: AccountId::new([seed; 32]) }),
        (any::<u8>(), proptest::collection::vec(any::<u8>(), 0..4), arb_durability()).prop_map(
            |(seed, key, durability)| EntryKey::ContractData {
                contract: ContractId::new([seed; 32]),
                key,
                durability,
            }
        ),
        any::<[u8; 32]>().prop_map(|hash| EntryKey::ContractCode { hash }),
        any::<[u8; 32]>().prop_map(|key_hash| EntryKey::Ttl { key_hash }),
    ]
}

/// A non-TTL entry.
pub fn arb_owner_entry() -> impl Strategy<Value = Entry> {
    prop_oneof![
        (any::<u8>(), any::<i64>(), arb_ledger_seq()).prop_map(|(seed, balance, lm)| {
            Entry::new(
                EntryData::Account(AccountEntry {
                    account_id: AccountId::new([seed; 32]),
                    balance,
                    seq_num: 0,
                    num_sub_entries: 0,
                    liabilities: None,
                }),
                lm,
            )
        }),
        (SEED_RANGE, arb_durability(), any::<u8>(), arb_ledger_seq()).prop_map(
            |(seed, durability, val, lm)| {
                Entry::new(
                    EntryData::ContractData(ContractDataEntry {
                        contract: ContractId::new([seed; 32]),
                        key: vec![seed],
                        durability,
                        val: vec![val],
                    }),
                    lm,
                )
            }
        ),
        (SEED_RANGE, arb_ledger_seq()).prop_map(|(seed, lm)| {
            let code = vec![seed; 16];
            Entry::new(EntryData::ContractCode(ContractCodeEntry { hash: sha256(&code), code }), lm)
        }),
    ]
}

/// Any entry, including TTL records for arbitrary owners.
pub fn arb_entry() -> impl Strategy<Value = Entry> {
    prop_oneof![
        3 => arb_owner_entry(),
        1 => (arb_owner_entry(), arb_ledger_seq(), arb_ledger_seq()).prop_map(
            |(owner, live_until, lm)| {
                Entry::ttl_for(&owner.key(), live_until, lm).unwrap_or(owner)
            }
        ),
    ]
}

/// Arbitrary tier transitions; usually inconsistent with any real state.
pub fn arb_tier_transitions() -> impl Strategy<Value = TierTransitions> {
    (
        proptest::collection::vec(arb_entry(), 0..6),
        proptest::collection::vec(arb_entry_key(), 0..6),
        proptest::collection::vec(arb_entry(), 0..4),
        proptest::collection::vec(arb_entry(), 0..4),
    )
        .prop_map(|(evicted, deleted_keys, from_archive, from_live)| TierTransitions {
            evicted,
            deleted_keys,
            restored_from_archive: from_archive.into_iter().map(|e| (e.key(), e)).collect(),
            restored_from_live: from_live.into_iter().map(|e| (e.key(), e)).collect(),
        })
}

/// One simulated ledger action; closes are frequent.
pub fn arb_sim_action() -> impl Strategy<Value = SimAction> {
    prop_oneof![
        3 => (SEED_RANGE, arb_durability(), any::<u8>(), LIFETIME_RANGE).prop_map(
            |(seed, durability, val, lifetime)| {
                SimAction::Create { seed, durability, val, lifetime }
            }
        ),
        1 => (SEED_RANGE, any::<u8>()).prop_map(|(seed, val)| SimAction::Update { seed, val }),
        2 => (SEED_RANGE, LIFETIME_RANGE)
            .prop_map(|(seed, lifetime)| SimAction::Restore { seed, lifetime }),
        3 => Just(SimAction::Close),
    ]
}

/// A history of up to `max_len` simulated actions.
pub fn arb_sim_actions(max_len: usize) -> impl Strategy<Value = Vec<SimAction>> {
    proptest::collection::vec(arb_sim_action(), 1..=max_len)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_arb_entry_ttls_point_at_ttl_governed_owners(entry in arb_entry()) {
            if let Some(ttl) = entry.as_ttl() {
                prop_assert!(ttl.live_until_ledger >= 1);
            }
            prop_assert_eq!(entry.key().entry_type(), entry.entry_type());
        }

        #[test]
        fn test_arb_sim_actions_stay_within_ranges(actions in arb_sim_actions(32)) {
            prop_assert!(!actions.is_empty());
            for action in actions {
                match action {
                    SimAction::Create { seed, lifetime, .. }
                    | SimAction::Restore { seed, lifetime } => {
                        prop_assert!(SEED_RANGE.contains(&seed));
                        prop_assert!(LIFETIME_RANGE.contains(&lifetime));
                    },
                    SimAction::Update { seed, .. } => prop_assert!(SEED_RANGE.contains(&seed)),
                    SimAction::Close => {},
                }
            }
        }
    }
}
