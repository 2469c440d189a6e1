//! Live/archive tiering consistency.
//!
//! Every ledger, the apply pipeline evicts expired persistent entries from
//! live state into the archive, deletes expired temporary entries outright,
//! and restores entries either from the archive or, when they expired but
//! were not yet evicted, in place from live state. This invariant checks
//! each of those moves against the snapshots of the previous ledger:
//!
//! - an evicted entry was live, had an expired TTL, and was not already archived
//! - every deleted temporary entry was live with an expired TTL
//! - deleted TTLs match the evicted and deleted owners one to one
//! - restored entries come with their TTLs and match the tier they came from
//!
//! At startup it also scans both complete snapshots for a key present in
//! both tiers.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    fmt,
    time::Duration,
};

use snafu::ResultExt;
use tiermark_state::{ArchiveSnapshot, LiveSnapshot};
use tiermark_types::{
    ArchiveEntry, Entry, EntryKey, FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION,
    FIRST_PROTOCOL_WITH_EVICTION_VALUE_FIX, ProtocolVersion, TierTransitions,
    config::InvariantConfig,
};

use crate::{
    error::{CheckResult, ContractViolationSnafu, SnapshotSnafu},
    invariant::Invariant,
    metrics,
    slow::SlowExecutionGuard,
};

const FAILURE_PREFIX: &str = "ArchivedStateConsistency invariant failed: ";

fn failed(detail: impl fmt::Display) -> String {
    format!("{FAILURE_PREFIX}{detail}")
}

fn ttl_is_live(entry: &Entry, ledger_seq: u32) -> bool {
    entry.as_ttl().is_some_and(|ttl| ttl.is_live(ledger_seq))
}

/// Previous-ledger values of every key a commit touches.
struct Preloaded {
    live: BTreeMap<EntryKey, Entry>,
    /// Archived entries only; restoration markers are dropped.
    archived: BTreeMap<EntryKey, Entry>,
}

/// Checks that entries move between the live and archive tiers correctly.
///
/// Strict: a violation halts ledger close.
#[derive(Debug, Clone)]
pub struct ArchivedStateConsistency {
    slow_commit_check_threshold: Duration,
    slow_startup_check_threshold: Duration,
}

impl ArchivedStateConsistency {
    /// Registered name.
    pub const NAME: &'static str = "ArchivedStateConsistency";

    /// Creates the invariant with the slow-check thresholds from `config`.
    pub fn new(config: &InvariantConfig) -> Self {
        Self {
            slow_commit_check_threshold: config.slow_commit_check_threshold,
            slow_startup_check_threshold: config.slow_startup_check_threshold,
        }
    }

    fn skip(protocol_version: ProtocolVersion) -> bool {
        if protocol_version.is_before(FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION) {
            tracing::info!(
                protocol_version = protocol_version.value(),
                "Skipping ArchivedStateConsistency invariant for {protocol_version}"
            );
            return true;
        }
        false
    }

    /// Collects every key the commit touches, plus the TTL keys of
    /// TTL-governed ones, for one batched lookup per tier.
    fn keys_to_preload(transitions: &TierTransitions) -> BTreeSet<EntryKey> {
        let keys = transitions
            .evicted
            .iter()
            .map(Entry::key)
            .chain(transitions.deleted_keys.iter().cloned())
            .chain(transitions.restored_from_archive.keys().cloned())
            .chain(transitions.restored_from_live.keys().cloned());

        let mut all = BTreeSet::new();
        for key in keys {
            if let Some(ttl_key) = key.ttl_key() {
                all.insert(ttl_key);
            }
            all.insert(key);
        }
        all
    }

    fn preload(
        live: &dyn LiveSnapshot,
        archive: &dyn ArchiveSnapshot,
        transitions: &TierTransitions,
    ) -> CheckResult<Preloaded> {
        let keys = Self::keys_to_preload(transitions);
        let live = live
            .load_keys(&keys)
            .context(SnapshotSnafu)?
            .into_iter()
            .map(|entry| (entry.key(), entry))
            .collect();
        let archived = archive
            .load_keys(&keys)
            .context(SnapshotSnafu)?
            .into_iter()
            .filter_map(|record| match record {
                ArchiveEntry::Archived(entry) => Some((entry.key(), entry)),
                ArchiveEntry::Live(_) => None,
            })
            .collect();
        Ok(Preloaded { live, archived })
    }

    fn check_eviction(
        preloaded: &Preloaded,
        deleted_keys: &BTreeSet<EntryKey>,
        evicted: &[Entry],
        ledger_seq: u32,
        protocol_version: ProtocolVersion,
    ) -> CheckResult {
        if deleted_keys.is_empty() && evicted.is_empty() {
            return Ok(String::new());
        }

        for entry in evicted {
            let key = entry.key();
            if !entry.is_persistent() {
                return ContractViolationSnafu {
                    message: format!("evicted entry is not a persistent entry: {key}"),
                }
                .fail();
            }
            let Some(ttl_key) = key.ttl_key() else {
                return ContractViolationSnafu {
                    message: format!("evicted entry has no TTL key: {key}"),
                }
                .fail();
            };

            if let Some(existing) = preloaded.archived.get(&key) {
                return Ok(failed(format_args!(
                    "Archived entry already present in archive: {existing}"
                )));
            }

            let Some(live_entry) = preloaded.live.get(&key) else {
                return Ok(failed(format_args!(
                    "Evicted entry does not exist in live state: {key}"
                )));
            };

            match preloaded.live.get(&ttl_key) {
                None => {
                    return Ok(failed(format_args!(
                        "TTL for persistent entry does not exist. Entry key: {key}, TTL key: {ttl_key}"
                    )));
                },
                Some(ttl) if ttl_is_live(ttl, ledger_seq) => {
                    return Ok(failed(format_args!(
                        "Evicted TTL is still live. Entry key: {key}, TTL entry: {ttl}"
                    )));
                },
                Some(_) => {},
            }

            // Protocol 23 could evict a stale version of an entry.
            if protocol_version.is_at_least(FIRST_PROTOCOL_WITH_EVICTION_VALUE_FIX)
                && entry != live_entry
            {
                return Ok(failed(format_args!(
                    "Outdated entry evicted. Key: {key}\nEvicted entry: {entry}\nCorrect value: {live_entry}"
                )));
            }
        }

        // Validity of persistent TTLs was checked through their owners above;
        // here they are only counted.
        let mut ttls = 0usize;
        let mut temps = 0usize;
        for key in deleted_keys {
            if key.is_ttl() {
                ttls += 1;
                continue;
            }
            if !key.is_temporary() {
                continue;
            }
            temps += 1;

            if !preloaded.live.contains_key(key) {
                return Ok(failed(format_args!(
                    "Evicted temp key does not exist in live state: {key}"
                )));
            }
            let Some(ttl_key) = key.ttl_key() else {
                continue;
            };
            match preloaded.live.get(&ttl_key) {
                None => {
                    return Ok(failed(format_args!(
                        "TTL for temp entry does not exist in live state. Entry key: {key}, TTL key: {ttl_key}"
                    )));
                },
                Some(ttl) if ttl_is_live(ttl, ledger_seq) => {
                    return Ok(failed(format_args!(
                        "Evicted TTL for temp entry is still live. Entry key: {key}, TTL entry: {ttl}"
                    )));
                },
                Some(_) => {},
            }
        }

        if temps + evicted.len() != ttls {
            return Ok(failed(format_args!(
                "Number of TTLs evicted does not match number of data/code entries evicted. \
                 Evicted {ttls} TTLs, {temps} temp entries, {} archived entries.",
                evicted.len()
            )));
        }

        Ok(String::new())
    }

    /// Checks that each restored entry is persistent and brought its TTL along.
    fn check_restored_batch(source: &str, restored: &BTreeMap<EntryKey, Entry>) -> String {
        for key in restored.keys().filter(|key| !key.is_ttl()) {
            if !key.is_persistent() {
                return failed(format_args!(
                    "Restored entry from {source} is not a persistent entry: {key}"
                ));
            }
            if let Some(ttl_key) = key.ttl_key()
                && !restored.contains_key(&ttl_key)
            {
                return failed(format_args!(
                    "TTL for restored entry from {source} is missing: {ttl_key}"
                ));
            }
        }
        String::new()
    }

    fn check_restoration(
        preloaded: &Preloaded,
        restored_from_archive: &BTreeMap<EntryKey, Entry>,
        restored_from_live: &BTreeMap<EntryKey, Entry>,
        ledger_seq: u32,
        protocol_version: ProtocolVersion,
    ) -> String {
        let result = Self::check_restored_batch("live state", restored_from_live);
        if !result.is_empty() {
            return result;
        }
        let result = Self::check_restored_batch("archive", restored_from_archive);
        if !result.is_empty() {
            return result;
        }

        let compare_ext = protocol_version.is_at_least(FIRST_PROTOCOL_WITH_EVICTION_VALUE_FIX);
        for (key, entry) in restored_from_archive {
            if preloaded.live.contains_key(key) {
                return failed(format_args!(
                    "Restored entry from archive is still in live state: {key}"
                ));
            }
            // Restored TTLs are created by the apply path; they were never archived.
            if key.is_ttl() {
                continue;
            }
            let Some(archived) = preloaded.archived.get(key) else {
                return failed(format_args!(
                    "Restored entry from archive does not exist in archive: {key}"
                ));
            };
            // The apply path may refresh last_modified_ledger, so it is not compared.
            if archived.data != entry.data || (compare_ext && archived.ext != entry.ext) {
                return failed(format_args!(
                    "Restored entry from archive has incorrect value: Entry to Restore: {entry}, Archive Entry: {archived}"
                ));
            }
        }

        for (key, entry) in restored_from_live {
            if let Some(archived) = preloaded.archived.get(key) {
                return failed(format_args!(
                    "Restored entry from live state exists in archive: Live Entry: {entry}, Archive Entry: {archived}"
                ));
            }
            let Some(live_entry) = preloaded.live.get(key) else {
                return failed(format_args!(
                    "Restored entry from live state does not exist in live state: {key}"
                ));
            };
            if live_entry != entry {
                return failed(format_args!(
                    "Restored entry from live state has incorrect value: Live Entry: {live_entry}, Entry to Restore: {entry}"
                ));
            }
            if key.is_ttl() && ttl_is_live(entry, ledger_seq) {
                return failed(format_args!(
                    "Restored entry from live state is not expired: TTL Entry: {entry}"
                ));
            }
        }

        String::new()
    }
}

impl Default for ArchivedStateConsistency {
    fn default() -> Self {
        Self::new(&InvariantConfig::default())
    }
}

impl Invariant for ArchivedStateConsistency {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_strict(&self) -> bool {
        true
    }

    fn check_on_ledger_commit(
        &self,
        live: &dyn LiveSnapshot,
        archive: &dyn ArchiveSnapshot,
        transitions: &TierTransitions,
    ) -> CheckResult {
        let _slow = SlowExecutionGuard::new(
            "ArchivedStateConsistency::check_on_ledger_commit",
            self.slow_commit_check_threshold,
        );

        let protocol_version = live.header().protocol_version;
        if Self::skip(protocol_version) {
            return Ok(String::new());
        }
        // The snapshots are of the previous ledger.
        let ledger_seq = live.ledger_seq().saturating_add(1);

        let preloaded = Self::preload(live, archive, transitions)?;
        let deleted_keys: BTreeSet<EntryKey> = transitions.deleted_keys.iter().cloned().collect();

        let eviction = Self::check_eviction(
            &preloaded,
            &deleted_keys,
            &transitions.evicted,
            ledger_seq,
            protocol_version,
        )?;
        let restoration = Self::check_restoration(
            &preloaded,
            &transitions.restored_from_archive,
            &transitions.restored_from_live,
            ledger_seq,
            protocol_version,
        );

        if eviction.is_empty() && restoration.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!("{eviction}\n{restoration}"))
        }
    }

    fn start(&self, live: &dyn LiveSnapshot, archive: &dyn ArchiveSnapshot) -> CheckResult {
        let _slow = SlowExecutionGuard::new(
            "ArchivedStateConsistency::start",
            self.slow_startup_check_threshold,
        );

        if Self::skip(live.header().protocol_version) {
            return Ok(String::new());
        }
        tracing::info!(
            ledger_seq = live.ledger_seq(),
            "Starting ArchivedStateConsistency invariant"
        );

        let mut archived_keys = archive.entries().context(SnapshotSnafu)?.filter_map(|record| {
            match record {
                Ok(ArchiveEntry::Archived(entry)) => Some(Ok(entry.key())),
                Ok(ArchiveEntry::Live(_)) => None,
                Err(e) => Some(Err(e)),
            }
        });
        let mut live_keys = live.entries().context(SnapshotSnafu)?.map(|r| r.map(|e| e.key()));

        let mut scanned = 0u64;
        let mut next_archived = archived_keys.next().transpose().context(SnapshotSnafu)?;
        let mut next_live = live_keys.next().transpose().context(SnapshotSnafu)?;
        let outcome = loop {
            let (Some(archived_key), Some(live_key)) = (&next_archived, &next_live) else {
                break String::new();
            };
            match archived_key.cmp(live_key) {
                Ordering::Less => {
                    scanned += 1;
                    next_archived = archived_keys.next().transpose().context(SnapshotSnafu)?;
                },
                Ordering::Greater => {
                    scanned += 1;
                    next_live = live_keys.next().transpose().context(SnapshotSnafu)?;
                },
                Ordering::Equal => {
                    scanned += 2;
                    break failed(format_args!(
                        "Entry with the same key is present in both live and archived state. Key: {archived_key}"
                    ));
                },
            }
        };
        if outcome.is_empty() {
            // One side is exhausted, so the rest of the other cannot collide.
            scanned += u64::from(next_archived.is_some()) + u64::from(next_live.is_some());
            for key in archived_keys.chain(live_keys) {
                key.context(SnapshotSnafu)?;
                scanned += 1;
            }
        }
        metrics::record_startup_scan_entries(scanned);

        if outcome.is_empty() {
            tracing::info!(scanned, "ArchivedStateConsistency invariant passed");
        }
        Ok(outcome)
    }
}
