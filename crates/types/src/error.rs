//! Machine-readable error catalog for Tiermark.
//!
//! Each crate defines its own snafu error enum close to the code that raises
//! it ([`CodecError`](crate::codec::CodecError),
//! [`ConfigError`](crate::config::ConfigError), the snapshot and invariant
//! errors in their crates). Every variant across those enums maps to an
//! [`ErrorCode`] with a unique numeric identifier, retryability
//! classification, and suggested recovery action.

use core::fmt;

/// Machine-readable error codes for programmatic error handling.
///
/// Codes are organized into ranges:
///
/// | Range       | Domain            | Examples                                      |
/// |-------------|-------------------|-----------------------------------------------|
/// | 1000–1099   | Configuration     | Validation failure                            |
/// | 1100–1199   | Codec             | Encode, decode                                |
/// | 2000–2099   | Invariant setup   | Duplicate registration, bad or empty pattern  |
/// | 2100–2199   | Invariant runtime | Strict violation, internal contract violation |
/// | 3000–3099   | Snapshot          | I/O, corruption, missing ledger, regression   |
///
/// Use [`ErrorCode::as_u16`] to render a code and [`ErrorCode::from_u16`] to
/// parse one back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // --- Configuration errors (1000–1099) ---
    /// A configuration value failed validation.
    ConfigValidation = 1000,

    // --- Codec errors (1100–1199) ---
    /// Serialization failed.
    CodecEncode = 1100,
    /// Deserialization failed (truncated or malformed input).
    CodecDecode = 1101,

    // --- Invariant setup errors (2000–2099) ---
    /// An invariant with the same name is already registered.
    InvariantDuplicateRegistration = 2000,
    /// An enable pattern was empty.
    InvariantEmptyPattern = 2001,
    /// An enable pattern is not a valid regular expression.
    InvariantInvalidPattern = 2002,
    /// An enable pattern matched an invariant that is already enabled.
    InvariantAlreadyEnabled = 2003,
    /// An enable pattern matched no registered invariant.
    InvariantNoMatch = 2004,

    // --- Invariant runtime errors (2100–2199) ---
    /// A strict invariant does not hold; the ledger must not be committed.
    InvariantDoesNotHold = 2100,
    /// The apply pipeline handed a checker input that breaks its contract.
    InvariantInternal = 2101,

    // --- Snapshot errors (3000–3099) ---
    /// Reading from the backing store failed.
    SnapshotIo = 3000,
    /// Snapshot content failed an integrity check.
    SnapshotCorrupted = 3001,
    /// No snapshot is retained for the requested ledger.
    SnapshotNotFound = 3002,
    /// A published snapshot does not advance the ledger sequence.
    SnapshotSequenceRegression = 3003,
}

impl ErrorCode {
    /// Returns the numeric code value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Converts a numeric code to an `ErrorCode`, returning `None` for unknown values.
    #[must_use]
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1000 => Some(Self::ConfigValidation),
            1100 => Some(Self::CodecEncode),
            1101 => Some(Self::CodecDecode),
            2000 => Some(Self::InvariantDuplicateRegistration),
            2001 => Some(Self::InvariantEmptyPattern),
            2002 => Some(Self::InvariantInvalidPattern),
            2003 => Some(Self::InvariantAlreadyEnabled),
            2004 => Some(Self::InvariantNoMatch),
            2100 => Some(Self::InvariantDoesNotHold),
            2101 => Some(Self::InvariantInternal),
            3000 => Some(Self::SnapshotIo),
            3001 => Some(Self::SnapshotCorrupted),
            3002 => Some(Self::SnapshotNotFound),
            3003 => Some(Self::SnapshotSequenceRegression),
            _ => None,
        }
    }

    /// Whether this error is retryable.
    ///
    /// Only transient storage failures qualify. Everything else requires
    /// corrective action first.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::SnapshotIo)
    }

    /// Whether this error must abort the in-progress ledger close.
    #[must_use]
    pub const fn halts_ledger_close(self) -> bool {
        matches!(
            self,
            Self::InvariantDoesNotHold
                | Self::InvariantInternal
                | Self::SnapshotIo
                | Self::SnapshotCorrupted
        )
    }

    /// Suggested recovery action for this error code.
    ///
    /// Stable guidance, safe to log to operator dashboards.
    #[must_use]
    pub const fn suggested_action(self) -> &'static str {
        match self {
            Self::ConfigValidation => "Fix the configuration value and restart the node.",
            Self::CodecEncode => {
                "Codec bug. Report as an issue with the value that failed to serialize."
            },
            Self::CodecDecode => {
                "Input is truncated or corrupt. Re-fetch the bytes or restore from a known-good copy."
            },
            Self::InvariantDuplicateRegistration => {
                "Register each invariant once. Two checkers share a name."
            },
            Self::InvariantEmptyPattern => "Remove the empty entry from the invariant checks list.",
            Self::InvariantInvalidPattern => {
                "Fix the regular expression in the invariant checks list."
            },
            Self::InvariantAlreadyEnabled => {
                "Remove the overlapping pattern. Each invariant may be enabled once."
            },
            Self::InvariantNoMatch => {
                "Use one of the registered invariant names listed in the error message."
            },
            Self::InvariantDoesNotHold => {
                "Do not commit the ledger. Capture the diagnostic and ledger state and report a bug."
            },
            Self::InvariantInternal => {
                "The apply pipeline produced inconsistent tier transitions. Report a bug with context."
            },
            Self::SnapshotIo => {
                "Check disk space, permissions, and I/O health, then retry the check."
            },
            Self::SnapshotCorrupted => {
                "Restore the affected store from a known-good snapshot. Report corruption details."
            },
            Self::SnapshotNotFound => {
                "The ledger is outside the retained history. Increase snapshot history_depth."
            },
            Self::SnapshotSequenceRegression => {
                "Publish snapshots in strictly increasing ledger order."
            },
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    const ALL: [ErrorCode; 14] = [
        ErrorCode::ConfigValidation,
        ErrorCode::CodecEncode,
        ErrorCode::CodecDecode,
        ErrorCode::InvariantDuplicateRegistration,
        ErrorCode::InvariantEmptyPattern,
        ErrorCode::InvariantInvalidPattern,
        ErrorCode::InvariantAlreadyEnabled,
        ErrorCode::InvariantNoMatch,
        ErrorCode::InvariantDoesNotHold,
        ErrorCode::InvariantInternal,
        ErrorCode::SnapshotIo,
        ErrorCode::SnapshotCorrupted,
        ErrorCode::SnapshotNotFound,
        ErrorCode::SnapshotSequenceRegression,
    ];

    #[test]
    fn test_error_code_numeric_uniqueness() {
        let codes: HashSet<u16> = ALL.iter().map(|c| c.as_u16()).collect();
        assert_eq!(codes.len(), ALL.len());
    }

    #[test]
    fn test_error_code_round_trip() {
        for code in ALL {
            assert_eq!(ErrorCode::from_u16(code.as_u16()), Some(code));
        }
    }

    #[test]
    fn test_error_code_unknown_value_returns_none() {
        assert_eq!(ErrorCode::from_u16(0), None);
        assert_eq!(ErrorCode::from_u16(1099), None);
        assert_eq!(ErrorCode::from_u16(u16::MAX), None);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::InvariantNoMatch.to_string(), "2004");
    }

    #[test]
    fn test_invariant_codes_in_range() {
        for code in ALL {
            let name = format!("{code:?}");
            let value = code.as_u16();
            if name.starts_with("Invariant") {
                assert!((2000..2200).contains(&value), "{name} = {value}");
            } else if name.starts_with("Snapshot") {
                assert!((3000..3100).contains(&value), "{name} = {value}");
            }
        }
    }

    #[test]
    fn test_only_runtime_failures_halt_ledger_close() {
        assert!(ErrorCode::InvariantDoesNotHold.halts_ledger_close());
        assert!(ErrorCode::InvariantInternal.halts_ledger_close());
        assert!(!ErrorCode::InvariantNoMatch.halts_ledger_close());
        assert!(!ErrorCode::ConfigValidation.halts_ledger_close());
    }

    #[test]
    fn test_retryable_codes() {
        let retryable: Vec<_> = ALL.iter().filter(|c| c.is_retryable()).collect();
        assert_eq!(retryable, vec![&ErrorCode::SnapshotIo]);
    }

    #[test]
    fn test_suggested_action_non_empty() {
        for code in ALL {
            assert!(!code.suggested_action().is_empty(), "{code:?}");
        }
    }
}
