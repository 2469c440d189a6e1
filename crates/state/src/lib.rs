//! Snapshot layer for Tiermark.
//!
//! This crate provides read-only, point-in-time views over the two storage
//! tiers that the invariant framework checks:
//!
//! - `LiveSnapshot` / `ArchiveSnapshot` capability traits
//! - Immutable in-memory snapshots that advance by producing new snapshots
//! - A snapshot manager retaining a bounded history keyed by ledger
//! - On-disk snapshot images for reload at startup
//! - Bucket segments handed to bucket-apply checks

#![deny(unsafe_code)]

mod bucket;
mod error;
mod image;
mod manager;
mod snapshot;

pub use bucket::{Bucket, BucketEntry, BucketLevel, LedgerRange};
pub use error::{Result, SnapshotError};
pub use image::{
    ImageBody, ImageHeader, ImageStore, SnapshotImage, image_filename, parse_image_filename,
};
pub use manager::{SnapshotManager, SnapshotPair};
pub use snapshot::{
    ArchiveIter, ArchiveSnapshot, ArchiveSnapshotRef, EntryIter, InMemoryArchiveSnapshot,
    InMemoryLiveSnapshot, LiveSnapshot, LiveSnapshotRef,
};
