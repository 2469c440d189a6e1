//! Invariant framework errors.
//!
//! Two layers:
//! - [`CheckError`] is what a checkpoint returns when it cannot produce a verdict at all: the
//!   apply pipeline broke its input contract, or a snapshot read failed.
//! - [`InvariantError`] is what the manager returns to its caller, covering setup mistakes and
//!   escalated violations.

use snafu::Snafu;
use tiermark_state::SnapshotError;
use tiermark_types::ErrorCode;

/// A checkpoint could not evaluate its invariant.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CheckError {
    /// The apply pipeline supplied input that violates the checkpoint's contract.
    #[snafu(display("Checkpoint contract violated: {message}"))]
    ContractViolation {
        /// What was wrong with the input.
        message: String,
    },

    /// Reading a snapshot failed.
    #[snafu(display("Snapshot read failed: {source}"))]
    Snapshot {
        /// The underlying snapshot error.
        source: SnapshotError,
    },
}

impl CheckError {
    /// Returns the machine-readable error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ContractViolation { .. } => ErrorCode::InvariantInternal,
            Self::Snapshot { source } => source.code(),
        }
    }
}

/// Errors returned by the invariant manager.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InvariantError {
    /// An invariant with this name is already registered.
    #[snafu(display("Invariant {name} already registered"))]
    DuplicateRegistration {
        /// Name of the invariant.
        name: String,
    },

    /// An enable pattern was empty.
    #[snafu(display("Invariant pattern must be non empty"))]
    EmptyPattern,

    /// An enable pattern does not compile.
    #[snafu(display("Invalid invariant pattern '{pattern}': {source}"))]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// The regex compiler error.
        source: regex::Error,
    },

    /// An enable pattern matched an invariant that is already enabled.
    #[snafu(display("Invariant {name} already enabled"))]
    AlreadyEnabled {
        /// Name of the invariant.
        name: String,
    },

    /// An enable pattern matched nothing.
    #[snafu(display("{message}"))]
    NoMatch {
        /// Diagnostic listing the registered invariants.
        message: String,
    },

    /// A strict invariant does not hold.
    #[snafu(display("{message}"))]
    DoesNotHold {
        /// The formatted failure message.
        message: String,
    },

    /// An invariant could not be evaluated.
    #[snafu(display("Invariant {name} could not be checked: {source}"))]
    Internal {
        /// Name of the invariant.
        name: String,
        /// Why the check failed.
        source: CheckError,
    },
}

impl InvariantError {
    /// Returns the machine-readable error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateRegistration { .. } => ErrorCode::InvariantDuplicateRegistration,
            Self::EmptyPattern => ErrorCode::InvariantEmptyPattern,
            Self::InvalidPattern { .. } => ErrorCode::InvariantInvalidPattern,
            Self::AlreadyEnabled { .. } => ErrorCode::InvariantAlreadyEnabled,
            Self::NoMatch { .. } => ErrorCode::InvariantNoMatch,
            Self::DoesNotHold { .. } => ErrorCode::InvariantDoesNotHold,
            Self::Internal { .. } => ErrorCode::InvariantInternal,
        }
    }
}

/// Result type for checkpoint evaluation.
pub type CheckResult<T = String> = std::result::Result<T, CheckError>;

/// Result type for manager operations.
pub type Result<T, E = InvariantError> = std::result::Result<T, E>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_errors_map_to_setup_codes() {
        assert_eq!(
            InvariantError::DuplicateRegistration { name: "A".into() }.code(),
            ErrorCode::InvariantDuplicateRegistration
        );
        assert_eq!(InvariantError::EmptyPattern.code(), ErrorCode::InvariantEmptyPattern);
        assert_eq!(
            InvariantError::NoMatch { message: String::new() }.code(),
            ErrorCode::InvariantNoMatch
        );
    }

    #[test]
    fn test_internal_errors_halt_ledger_close() {
        let err = InvariantError::Internal {
            name: "A".into(),
            source: CheckError::ContractViolation { message: "bad input".into() },
        };
        assert!(err.code().halts_ledger_close());
        assert!(InvariantError::DoesNotHold { message: "x".into() }.code().halts_ledger_close());
    }

    #[test]
    fn test_snapshot_check_error_keeps_snapshot_code() {
        let err = CheckError::Snapshot { source: SnapshotError::NotFound { ledger_seq: 3 } };
        assert_eq!(err.code(), ErrorCode::SnapshotNotFound);
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            InvariantError::AlreadyEnabled { name: "Bx".into() }.to_string(),
            "Invariant Bx already enabled"
        );
        assert_eq!(InvariantError::EmptyPattern.to_string(), "Invariant pattern must be non empty");
    }
}
