//! Snapshot layer errors.

use snafu::Snafu;
use tiermark_types::{CodecError, ErrorCode};

/// Snapshot error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SnapshotError {
    /// IO error while reading or writing a snapshot image.
    #[snafu(display("IO error: {source}"))]
    Io {
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Error encoding or decoding snapshot data.
    #[snafu(display("Codec error: {source}"))]
    Codec {
        /// The underlying codec error.
        source: CodecError,
    },

    /// Snapshot content failed an integrity check.
    #[snafu(display("Snapshot corrupted: {message}"))]
    Corrupted {
        /// What failed to verify.
        message: String,
    },

    /// No snapshot is retained for the requested ledger.
    #[snafu(display("No snapshot retained for ledger {ledger_seq}"))]
    NotFound {
        /// The requested ledger sequence.
        ledger_seq: u32,
    },

    /// A new snapshot does not advance past the current one.
    #[snafu(display("Snapshot for ledger {attempted} does not advance past ledger {current}"))]
    SequenceRegression {
        /// Sequence of the current snapshot.
        current: u32,
        /// Sequence of the rejected snapshot.
        attempted: u32,
    },

    /// A live/archive pair was captured at different ledgers.
    #[snafu(display("Live snapshot at ledger {live} paired with archive at ledger {archive}"))]
    LedgerMismatch {
        /// Live snapshot sequence.
        live: u32,
        /// Archive snapshot sequence.
        archive: u32,
    },
}

impl SnapshotError {
    /// Returns the machine-readable error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } => ErrorCode::SnapshotIo,
            Self::Codec { source } => source.code(),
            Self::Corrupted { .. } | Self::LedgerMismatch { .. } => ErrorCode::SnapshotCorrupted,
            Self::NotFound { .. } => ErrorCode::SnapshotNotFound,
            Self::SequenceRegression { .. } => ErrorCode::SnapshotSequenceRegression,
        }
    }
}

/// Result type for snapshot operations.
pub type Result<T, E = SnapshotError> = std::result::Result<T, E>;
