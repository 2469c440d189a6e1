//! Invariant registry, activation and failure escalation.
//!
//! The manager is the single entry point the ledger-apply path calls into.
//! Invariants are registered once at startup, enabled by name pattern, and
//! then dispatched at each checkpoint in the order they were enabled.
//!
//! A non-empty diagnostic is recorded against the invariant's name and then
//! escalated: strict invariants fail the dispatching call with
//! [`InvariantError::DoesNotHold`], non-strict ones are only logged. An
//! invariant that cannot be evaluated at all always fails the call.
//!
//! All checkpoints run on the thread closing the ledger, so the manager is
//! driven through `&mut self` and holds no locks.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use serde_json::{Map, Value, json};
use snafu::ResultExt;
use tiermark_state::{ArchiveSnapshot, Bucket, BucketLevel, LedgerRange, LiveSnapshot};
use tiermark_types::{
    ContractEvent, EntryKey, FIRST_PROTOCOL_WITH_OPERATION_INVARIANTS, LedgerDelta, Operation,
    OperationResult, TierTransitions,
    config::{InvariantConfig, name_pattern},
    to_hex,
};

use crate::{
    archived_state::ArchivedStateConsistency,
    error::{
        AlreadyEnabledSnafu, CheckError, DuplicateRegistrationSnafu, EmptyPatternSnafu,
        InvalidPatternSnafu, InvariantError, NoMatchSnafu, Result,
    },
    invariant::{Invariant, InvariantRef},
    liabilities::LiabilitiesMatchOffers,
    metrics::{self, Timer, checkpoint},
    ttl_owners::TtlEntriesMatchOwners,
};

/// The invariant whose data is available before operation invariants were introduced.
const EVENTS_INVARIANT: &str = "EventsAreConsistentWithEntryDiffs";

/// The invariant that needs bucket-apply context retained.
const BUCKET_APPLY_INVARIANT: &str = "BucketListIsConsistentWithDatabase";

const REPORT_INTERNAL_BUG: &str =
    "This is a bug in ledger processing. Please report it with the logs leading up to this ledger.";

/// Most recent failure of one invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureInformation {
    /// Ledger the failure was recorded at.
    pub last_failed_on_ledger: u32,
    /// The full failure message.
    pub last_failed_with_message: String,
}

/// Registry and dispatcher for invariants.
pub struct InvariantManager {
    config: InvariantConfig,
    registered: BTreeMap<String, InvariantRef>,
    enabled: Vec<InvariantRef>,
    failures: BTreeMap<String, FailureInformation>,
    failure_count: u64,
}

impl InvariantManager {
    /// Creates a manager with no registered invariants.
    ///
    /// `config` supplies the slow-check thresholds for built-in invariants
    /// and the patterns used by [`Self::enable_from_config`].
    pub fn new(config: &InvariantConfig) -> Self {
        Self {
            config: config.clone(),
            registered: BTreeMap::new(),
            enabled: Vec::new(),
            failures: BTreeMap::new(),
            failure_count: 0,
        }
    }

    /// Registers an invariant and returns a typed handle to it.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantError::DuplicateRegistration`] if an invariant
    /// with the same name is already registered.
    pub fn register<T: Invariant + 'static>(&mut self, invariant: T) -> Result<Arc<T>> {
        let name = invariant.name().to_string();
        if self.registered.contains_key(&name) {
            return DuplicateRegistrationSnafu { name }.fail();
        }
        let handle = Arc::new(invariant);
        self.registered.insert(name, handle.clone());
        Ok(handle)
    }

    /// Registers every built-in invariant.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantError::DuplicateRegistration`] if any of them is
    /// already registered.
    pub fn register_builtin(&mut self) -> Result<()> {
        self.register(ArchivedStateConsistency::new(&self.config))?;
        self.register(LiabilitiesMatchOffers)?;
        self.register(TtlEntriesMatchOwners)?;
        Ok(())
    }

    /// Enables every registered invariant whose whole name matches `pattern`,
    /// ignoring case.
    ///
    /// Nothing is enabled unless the call succeeds.
    ///
    /// # Errors
    ///
    /// - [`InvariantError::EmptyPattern`] if `pattern` is empty
    /// - [`InvariantError::InvalidPattern`] if it does not compile
    /// - [`InvariantError::AlreadyEnabled`] if it matches an enabled invariant
    /// - [`InvariantError::NoMatch`] if it matches nothing; the message lists the registered names
    pub fn enable_invariant(&mut self, pattern: &str) -> Result<()> {
        if pattern.is_empty() {
            return EmptyPatternSnafu.fail();
        }
        let regex = name_pattern(pattern).context(InvalidPatternSnafu { pattern })?;

        let matched: Vec<&InvariantRef> = self
            .registered
            .iter()
            .filter(|(name, _)| !name.is_empty() && regex.is_match(name))
            .map(|(_, invariant)| invariant)
            .collect();

        if let Some(enabled) = matched.iter().find(|inv| self.is_enabled(inv.name())) {
            return AlreadyEnabledSnafu { name: enabled.name() }.fail();
        }

        if matched.is_empty() {
            let mut message =
                format!("Invariant pattern '{pattern}' did not match any invariants.");
            if self.registered.is_empty() {
                message.push_str(" There are no registered invariants");
            } else {
                let names: Vec<&str> = self.registered.keys().map(String::as_str).collect();
                message.push_str(" Registered invariants are: ");
                message.push_str(&names.join(", "));
            }
            return NoMatchSnafu { message }.fail();
        }

        let matched: Vec<InvariantRef> = matched.into_iter().cloned().collect();
        for invariant in matched {
            tracing::info!(
                invariant = invariant.name(),
                "Enabled invariant '{}'",
                invariant.name()
            );
            self.enabled.push(invariant);
        }
        Ok(())
    }

    /// Enables every pattern in the configuration, in order.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first [`Self::enable_invariant`] error.
    pub fn enable_from_config(&mut self) -> Result<()> {
        let patterns = self.config.checks.clone();
        for pattern in &patterns {
            self.enable_invariant(pattern)?;
        }
        Ok(())
    }

    fn is_enabled(&self, name: &str) -> bool {
        self.enabled.iter().any(|inv| inv.name() == name)
    }

    /// Names of enabled invariants, in the order they were enabled.
    pub fn enabled_invariants(&self) -> Vec<String> {
        self.enabled.iter().map(|inv| inv.name().to_string()).collect()
    }

    /// Whether bucket-apply context must be retained for checking.
    pub fn is_bucket_apply_invariant_enabled(&self) -> bool {
        self.is_enabled(BUCKET_APPLY_INVARIANT)
    }

    /// Total failures recorded by this manager.
    pub fn failure_count(&self) -> u64 {
        self.failure_count
    }

    /// Most recent failure of the named invariant.
    pub fn failure_info(&self, name: &str) -> Option<&FailureInformation> {
        self.failures.get(name)
    }

    /// Status report of every invariant that has failed.
    ///
    /// Maps each name to `last_failed_on_ledger` and
    /// `last_failed_with_message`, plus a `count` of all failures. Empty
    /// when nothing has failed.
    pub fn json_info(&self) -> Value {
        let mut report = Map::new();
        for (name, info) in &self.failures {
            report.insert(
                name.clone(),
                json!({
                    "last_failed_on_ledger": info.last_failed_on_ledger,
                    "last_failed_with_message": info.last_failed_with_message,
                }),
            );
        }
        if !report.is_empty() {
            report.insert("count".to_string(), json!(self.failure_count));
        }
        Value::Object(report)
    }

    /// Checks a merged bucket against every enabled invariant.
    ///
    /// Failures are recorded at `ledger`.
    ///
    /// # Errors
    ///
    /// Returns an error if a strict invariant does not hold or any invariant
    /// cannot be evaluated.
    pub fn check_on_bucket_apply(
        &mut self,
        bucket: &Bucket,
        ledger: u32,
        range: LedgerRange,
        level: BucketLevel,
        shadowed_keys: &BTreeSet<EntryKey>,
    ) -> Result<()> {
        let _timer = Timer::start(checkpoint::BUCKET_APPLY);
        for invariant in self.enabled.clone() {
            let result = self.evaluate(&invariant, |inv| {
                inv.check_on_bucket_apply(bucket, range, level, shadowed_keys)
            })?;
            if result.is_empty() {
                continue;
            }
            let message = format!(
                "invariant \"{}\" does not hold on bucket {level} = {}: {result}",
                invariant.name(),
                to_hex(bucket.hash())
            );
            self.on_invariant_failure(&invariant, message, ledger)?;
        }
        Ok(())
    }

    /// Checks the state after a bulk load against every enabled invariant.
    ///
    /// Failures are recorded at ledger 0.
    ///
    /// # Errors
    ///
    /// Returns an error if a strict invariant does not hold or any invariant
    /// cannot be evaluated.
    pub fn check_after_assume_state(&mut self, newest_ledger: u32) -> Result<()> {
        let _timer = Timer::start(checkpoint::ASSUME_STATE);
        for invariant in self.enabled.clone() {
            let result =
                self.evaluate(&invariant, |inv| inv.check_after_assume_state(newest_ledger))?;
            if result.is_empty() {
                continue;
            }
            let message = format!(
                "invariant \"{}\" does not hold after assume state: {result}",
                invariant.name()
            );
            self.on_invariant_failure(&invariant, message, 0)?;
        }
        Ok(())
    }

    /// Checks one applied operation against every enabled invariant.
    ///
    /// Before operation invariants were introduced only the events
    /// consistency invariant runs. Failures are recorded at the delta's
    /// current ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if a strict invariant does not hold or any invariant
    /// cannot be evaluated.
    pub fn check_on_operation_apply(
        &mut self,
        operation: &Operation,
        result: &OperationResult,
        delta: &LedgerDelta,
        events: &[ContractEvent],
    ) -> Result<()> {
        let _timer = Timer::start(checkpoint::OPERATION_APPLY);
        let protocol_version = delta.header.current.protocol_version;
        for invariant in self.enabled.clone() {
            if protocol_version.is_before(FIRST_PROTOCOL_WITH_OPERATION_INVARIANTS)
                && invariant.name() != EVENTS_INVARIANT
            {
                continue;
            }
            let diagnostic = self.evaluate(&invariant, |inv| {
                inv.check_on_operation_apply(operation, result, delta, events)
            })?;
            if diagnostic.is_empty() {
                continue;
            }
            let message = format!(
                "Invariant \"{}\" does not hold on operation: {diagnostic}\n{operation}",
                invariant.name()
            );
            self.on_invariant_failure(&invariant, message, delta.header.current.ledger_seq)?;
        }
        Ok(())
    }

    /// Checks the tier transitions of the ledger being committed.
    ///
    /// `live` and `archive` are the previous ledger's snapshots; failures
    /// are recorded at the ledger after them.
    ///
    /// # Errors
    ///
    /// Returns an error if a strict invariant does not hold or any invariant
    /// cannot be evaluated.
    pub fn check_on_ledger_commit(
        &mut self,
        live: &dyn LiveSnapshot,
        archive: &dyn ArchiveSnapshot,
        transitions: &TierTransitions,
    ) -> Result<()> {
        let _timer = Timer::start(checkpoint::LEDGER_COMMIT);
        let ledger = live.ledger_seq().saturating_add(1);
        for invariant in self.enabled.clone() {
            let result = self.evaluate(&invariant, |inv| {
                inv.check_on_ledger_commit(live, archive, transitions)
            })?;
            if result.is_empty() {
                continue;
            }
            let message = format!(
                "invariant \"{}\" does not hold on ledger commit: {result}",
                invariant.name()
            );
            self.on_invariant_failure(&invariant, message, ledger)?;
        }
        Ok(())
    }

    /// Runs the startup scan of every enabled invariant.
    ///
    /// Failures are recorded at the snapshots' ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if a strict invariant does not hold or any invariant
    /// cannot be evaluated.
    pub fn start(&mut self, live: &dyn LiveSnapshot, archive: &dyn ArchiveSnapshot) -> Result<()> {
        let _timer = Timer::start(checkpoint::START);
        for invariant in self.enabled.clone() {
            let result = self.evaluate(&invariant, |inv| inv.start(live, archive))?;
            if result.is_empty() {
                continue;
            }
            let message =
                format!("invariant \"{}\" does not hold on startup: {result}", invariant.name());
            self.on_invariant_failure(&invariant, message, live.ledger_seq())?;
        }
        Ok(())
    }

    /// Runs one checkpoint, escalating an evaluation error unconditionally.
    fn evaluate(
        &self,
        invariant: &InvariantRef,
        check: impl FnOnce(&dyn Invariant) -> std::result::Result<String, CheckError>,
    ) -> Result<String> {
        check(invariant.as_ref()).map_err(|source| {
            tracing::error!(
                severity = "fatal",
                invariant = invariant.name(),
                error_code = source.code().as_u16(),
                "Invariant {} could not be checked: {source}",
                invariant.name()
            );
            InvariantError::Internal { name: invariant.name().to_string(), source }
        })
    }

    fn on_invariant_failure(
        &mut self,
        invariant: &InvariantRef,
        message: String,
        ledger: u32,
    ) -> Result<()> {
        let name = invariant.name();
        let strict = invariant.is_strict();

        self.failure_count += 1;
        self.failures.insert(
            name.to_string(),
            FailureInformation {
                last_failed_on_ledger: ledger,
                last_failed_with_message: message.clone(),
            },
        );
        metrics::record_failure(name, strict);

        if cfg!(fuzzing) {
            std::process::abort();
        }

        if strict {
            tracing::error!(severity = "fatal", invariant = name, ledger, "{message}");
            tracing::error!(severity = "fatal", invariant = name, "{REPORT_INTERNAL_BUG}");
            return Err(InvariantError::DoesNotHold { message });
        }
        tracing::error!(invariant = name, ledger, "{message}");
        tracing::error!(invariant = name, "{REPORT_INTERNAL_BUG}");
        Ok(())
    }
}

impl std::fmt::Debug for InvariantManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvariantManager")
            .field("registered", &self.registered.keys().collect::<Vec<_>>())
            .field("enabled", &self.enabled_invariants())
            .field("failure_count", &self.failure_count)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tiermark_state::{InMemoryArchiveSnapshot, InMemoryLiveSnapshot};
    use tiermark_test_utils::{
        LogCapture,
        fixtures::{header, operation, persistent_data},
    };
    use tiermark_types::{ArchiveEntry, OperationType};

    use super::*;
    use crate::error::CheckResult;

    /// Returns a fixed diagnostic from every checkpoint it implements.
    #[derive(Debug)]
    struct Scripted {
        name: &'static str,
        strict: bool,
        diagnostic: &'static str,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, strict: bool, diagnostic: &'static str) -> Self {
            Self { name, strict, diagnostic, calls: AtomicUsize::new(0) }
        }

        fn verdict(&self) -> CheckResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.diagnostic.to_string())
        }
    }

    impl Invariant for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn is_strict(&self) -> bool {
            self.strict
        }

        fn check_after_assume_state(&self, _newest_ledger: u32) -> CheckResult {
            self.verdict()
        }

        fn check_on_operation_apply(
            &self,
            _operation: &Operation,
            _result: &OperationResult,
            _delta: &LedgerDelta,
            _events: &[ContractEvent],
        ) -> CheckResult {
            self.verdict()
        }

        fn check_on_bucket_apply(
            &self,
            _bucket: &Bucket,
            _range: LedgerRange,
            _level: BucketLevel,
            _shadowed_keys: &BTreeSet<EntryKey>,
        ) -> CheckResult {
            self.verdict()
        }

        fn check_on_ledger_commit(
            &self,
            _live: &dyn LiveSnapshot,
            _archive: &dyn ArchiveSnapshot,
            _transitions: &TierTransitions,
        ) -> CheckResult {
            self.verdict()
        }
    }

    /// Cannot be evaluated.
    #[derive(Debug)]
    struct Broken;

    impl Invariant for Broken {
        fn name(&self) -> &str {
            "Broken"
        }

        fn is_strict(&self) -> bool {
            false
        }

        fn check_after_assume_state(&self, _newest_ledger: u32) -> CheckResult {
            Err(CheckError::ContractViolation { message: "bad input".to_string() })
        }
    }

    fn manager() -> InvariantManager {
        InvariantManager::new(&InvariantConfig::default())
    }

    fn manager_with(invariants: Vec<Scripted>) -> InvariantManager {
        let mut manager = manager();
        for invariant in invariants {
            manager.register(invariant).unwrap();
        }
        manager
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut manager = manager();
        manager.register(Scripted::new("A", true, "")).unwrap();
        let err = manager.register(Scripted::new("A", false, "")).unwrap_err();
        assert!(matches!(err, InvariantError::DuplicateRegistration { ref name } if name == "A"));
        assert_eq!(err.to_string(), "Invariant A already registered");
    }

    #[test]
    fn test_register_builtin() {
        let mut manager = manager();
        manager.register_builtin().unwrap();
        manager.enable_invariant(".*").unwrap();
        assert_eq!(
            manager.enabled_invariants(),
            vec![
                "ArchivedStateConsistency".to_string(),
                "LiabilitiesMatchOffers".to_string(),
                "TtlEntriesMatchOwners".to_string(),
            ]
        );
        assert!(manager.register_builtin().is_err());
    }

    #[test]
    fn test_enable_scenario() {
        let mut manager =
            manager_with(vec![Scripted::new("A", true, ""), Scripted::new("Bx", true, "")]);

        manager.enable_invariant("A").unwrap();
        assert_eq!(manager.enabled_invariants(), vec!["A"]);

        manager.enable_invariant("B.*").unwrap();
        assert_eq!(manager.enabled_invariants(), vec!["A", "Bx"]);

        let err = manager.enable_invariant("Z").unwrap_err();
        assert!(matches!(err, InvariantError::NoMatch { .. }));
        assert_eq!(
            err.to_string(),
            "Invariant pattern 'Z' did not match any invariants. Registered invariants are: A, Bx"
        );
        assert_eq!(manager.enabled_invariants(), vec!["A", "Bx"]);
    }

    #[test]
    fn test_no_match_without_registrations() {
        let err = manager().enable_invariant("A").unwrap_err();
        assert!(err.to_string().ends_with("There are no registered invariants"));
    }

    #[test]
    fn test_enable_is_case_insensitive_and_anchored() {
        let mut manager = manager_with(vec![
            Scripted::new("ArchivedState", true, ""),
            Scripted::new("State", true, ""),
        ]);
        manager.enable_invariant("state").unwrap();
        assert_eq!(manager.enabled_invariants(), vec!["State"]);
    }

    #[test]
    fn test_already_enabled_leaves_enabled_set_unchanged() {
        let mut manager =
            manager_with(vec![Scripted::new("A", true, ""), Scripted::new("Ab", true, "")]);
        manager.enable_invariant("A").unwrap();

        let err = manager.enable_invariant("A.*").unwrap_err();
        assert!(matches!(err, InvariantError::AlreadyEnabled { ref name } if name == "A"));
        // "Ab" matched too but must not have been enabled.
        assert_eq!(manager.enabled_invariants(), vec!["A"]);
    }

    #[test]
    fn test_empty_and_invalid_patterns() {
        let mut manager = manager_with(vec![Scripted::new("A", true, "")]);
        assert!(matches!(manager.enable_invariant(""), Err(InvariantError::EmptyPattern)));
        let err = manager.enable_invariant("(").unwrap_err();
        assert!(matches!(err, InvariantError::InvalidPattern { .. }));
        assert!(err.to_string().starts_with("Invalid invariant pattern '('"));
        assert!(manager.enabled_invariants().is_empty());
    }

    #[test]
    fn test_alternation_pattern_cannot_escape_anchors() {
        let mut manager =
            manager_with(vec![Scripted::new("Ax", true, ""), Scripted::new("B", true, "")]);
        let err = manager.enable_invariant("A)|(B").unwrap_err();
        assert!(matches!(
            err,
            InvariantError::InvalidPattern { ref pattern, .. } if pattern == "A)|(B"
        ));
        assert!(manager.enabled_invariants().is_empty());
    }

    #[test]
    fn test_enable_from_config_stops_at_first_error() {
        let config = InvariantConfig::builder()
            .checks(vec!["A".to_string(), "Z".to_string(), "Bx".to_string()])
            .build()
            .unwrap();
        let mut manager = InvariantManager::new(&config);
        manager.register(Scripted::new("A", true, "")).unwrap();
        manager.register(Scripted::new("Bx", true, "")).unwrap();
        assert!(manager.enable_from_config().is_err());
        assert_eq!(manager.enabled_invariants(), vec!["A"]);
    }

    #[test]
    fn test_strict_failure_raises_and_records() {
        let mut manager = manager_with(vec![Scripted::new("A", true, "broken")]);
        manager.enable_invariant("A").unwrap();

        let err = manager.check_after_assume_state(7).unwrap_err();
        assert!(matches!(err, InvariantError::DoesNotHold { .. }));
        let info = manager.failure_info("A").unwrap();
        assert_eq!(info.last_failed_on_ledger, 0);
        assert_eq!(
            info.last_failed_with_message,
            "invariant \"A\" does not hold after assume state: broken"
        );
        assert_eq!(manager.failure_count(), 1);
    }

    #[test]
    fn test_non_strict_failure_continues_and_counts() {
        let mut manager = manager_with(vec![
            Scripted::new("A", false, "advisory"),
            Scripted::new("B", false, ""),
        ]);
        manager.enable_invariant("A|B").unwrap();

        manager.check_after_assume_state(7).unwrap();
        manager.check_after_assume_state(8).unwrap();
        assert_eq!(manager.failure_count(), 2);
        assert!(manager.failure_info("B").is_none());
    }

    #[test]
    fn test_strict_failure_stops_dispatch() {
        let mut manager = manager();
        manager.register(Scripted::new("A", true, "broken")).unwrap();
        let second = manager.register(Scripted::new("B", true, "")).unwrap();
        manager.enable_invariant("A").unwrap();
        manager.enable_invariant("B").unwrap();

        assert!(manager.check_after_assume_state(1).is_err());
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failure_info_is_overwritten() {
        let mut manager = manager_with(vec![Scripted::new("A", false, "again")]);
        manager.enable_invariant("A").unwrap();
        let delta_at = |seq| LedgerDelta::new(header(seq, 23));
        let op = operation(OperationType::Payment);

        for seq in [10, 11] {
            manager
                .check_on_operation_apply(&op, &OperationResult::Success, &delta_at(seq), &[])
                .unwrap();
        }

        let info = manager.failure_info("A").unwrap();
        assert_eq!(info.last_failed_on_ledger, 11);
        assert_eq!(
            info.last_failed_with_message,
            format!("Invariant \"A\" does not hold on operation: again\n{op}")
        );
        assert_eq!(manager.failure_count(), 2);
    }

    #[test]
    fn test_operation_checks_gated_before_protocol_8() {
        let mut manager = manager();
        let other = manager.register(Scripted::new("A", false, "x")).unwrap();
        let events = manager.register(Scripted::new(EVENTS_INVARIANT, false, "")).unwrap();
        manager.enable_invariant(".*").unwrap();

        let delta = LedgerDelta::new(header(5, 7));
        manager
            .check_on_operation_apply(
                &operation(OperationType::Payment),
                &OperationResult::Success,
                &delta,
                &[],
            )
            .unwrap();
        assert_eq!(other.calls.load(Ordering::SeqCst), 0);
        assert_eq!(events.calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.failure_count(), 0);
    }

    #[test]
    fn test_bucket_failure_message() {
        let mut manager = manager_with(vec![Scripted::new("A", false, "bad bucket")]);
        manager.enable_invariant("A").unwrap();
        let bucket = Bucket::empty();
        manager
            .check_on_bucket_apply(
                &bucket,
                64,
                LedgerRange::new(33, 32),
                BucketLevel { level: 3, is_curr: true },
                &BTreeSet::new(),
            )
            .unwrap();
        let info = manager.failure_info("A").unwrap();
        assert_eq!(info.last_failed_on_ledger, 64);
        assert_eq!(
            info.last_failed_with_message,
            format!(
                "invariant \"A\" does not hold on bucket Curr[3] = {}: bad bucket",
                to_hex(bucket.hash())
            )
        );
    }

    #[test]
    fn test_ledger_commit_failure_recorded_at_next_ledger() {
        let mut manager = manager_with(vec![Scripted::new("A", false, "tiers")]);
        manager.enable_invariant("A").unwrap();
        let live = InMemoryLiveSnapshot::empty(header(41, 23));
        let archive = InMemoryArchiveSnapshot::empty(header(41, 23));
        manager.check_on_ledger_commit(&live, &archive, &TierTransitions::default()).unwrap();
        assert_eq!(manager.failure_info("A").unwrap().last_failed_on_ledger, 42);
    }

    #[test]
    fn test_start_routes_through_failure_handling() {
        let mut manager = manager();
        manager.register_builtin().unwrap();
        manager.enable_invariant("ArchivedStateConsistency").unwrap();
        let shared = persistent_data(1, 1, 1);
        let live = InMemoryLiveSnapshot::new(header(9, 23), [shared.clone()]);
        let archive = InMemoryArchiveSnapshot::new(
            header(9, 23),
            [ArchiveEntry::Archived(shared)],
        );

        let err = manager.start(&live, &archive).unwrap_err();
        assert!(matches!(err, InvariantError::DoesNotHold { .. }));
        let info = manager.failure_info("ArchivedStateConsistency").unwrap();
        assert_eq!(info.last_failed_on_ledger, 9);
        assert!(info.last_failed_with_message.contains("present in both live and archived state"));
    }

    #[test]
    fn test_check_error_escalates_even_when_not_strict() {
        let mut manager = manager();
        manager.register(Broken).unwrap();
        manager.enable_invariant("Broken").unwrap();
        let err = manager.check_after_assume_state(1).unwrap_err();
        assert!(matches!(err, InvariantError::Internal { ref name, .. } if name == "Broken"));
        assert_eq!(manager.failure_count(), 0);
    }

    #[test]
    fn test_json_info() {
        let mut manager = manager_with(vec![Scripted::new("A", false, "oops")]);
        assert_eq!(manager.json_info(), json!({}));

        manager.enable_invariant("A").unwrap();
        manager.check_after_assume_state(3).unwrap();
        assert_eq!(
            manager.json_info(),
            json!({
                "A": {
                    "last_failed_on_ledger": 0,
                    "last_failed_with_message": "invariant \"A\" does not hold after assume state: oops",
                },
                "count": 1,
            })
        );
    }

    #[test]
    fn test_bucket_apply_invariant_enabled() {
        let mut manager = manager_with(vec![Scripted::new(BUCKET_APPLY_INVARIANT, false, "")]);
        assert!(!manager.is_bucket_apply_invariant_enabled());
        manager.enable_invariant("BucketList.*").unwrap();
        assert!(manager.is_bucket_apply_invariant_enabled());
    }

    #[test]
    fn test_strict_failure_logs_fatal_severity() {
        let capture = LogCapture::new();
        let mut manager = manager_with(vec![Scripted::new("A", true, "broken")]);
        manager.enable_invariant("A").unwrap();
        capture.run(|| {
            let _ = manager.check_after_assume_state(1);
        });
        let fatal = capture.events_with_field("severity", "fatal");
        assert_eq!(fatal.len(), 2);
        assert!(fatal.iter().all(|e| e.level == tracing::Level::ERROR));
        assert!(fatal[0].message.contains("does not hold after assume state"));
    }

    #[test]
    fn test_non_strict_failure_logs_error_without_fatal() {
        let capture = LogCapture::new();
        let mut manager = manager_with(vec![Scripted::new("A", false, "advisory")]);
        manager.enable_invariant("A").unwrap();
        capture.run(|| manager.check_after_assume_state(1).unwrap());
        assert!(capture.events_with_field("severity", "fatal").is_empty());
        assert_eq!(capture.events_at(tracing::Level::ERROR).len(), 2);
    }
}
