//! Invariant framework for Tiermark.
//!
//! Checks the rules a correct ledger must satisfy as state moves between
//! the live and archive tiers:
//!
//! - [`Invariant`]: the checker capability, polymorphic over five checkpoints
//! - [`ArchivedStateConsistency`]: eviction, deletion and restoration rules plus a startup scan
//! - [`LiabilitiesMatchOffers`]: account and trustline liabilities follow their offers
//! - [`TtlEntriesMatchOwners`]: TTL records appear and disappear with their owners
//! - [`InvariantManager`]: registration, pattern-based enabling and failure escalation
//!
//! # Example
//!
//! ```no_run
//! use tiermark_invariant::InvariantManager;
//! use tiermark_types::config::InvariantConfig;
//!
//! let config = InvariantConfig::builder()
//!     .checks(vec!["ArchivedStateConsistency".to_string()])
//!     .build()?;
//! let mut manager = InvariantManager::new(&config);
//! manager.register_builtin()?;
//! manager.enable_from_config()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]

mod archived_state;
mod error;
mod invariant;
mod liabilities;
mod manager;
pub mod metrics;
mod slow;
mod ttl_owners;

pub use archived_state::ArchivedStateConsistency;
pub use error::{CheckError, CheckResult, InvariantError, Result};
pub use invariant::{Invariant, InvariantRef};
pub use liabilities::LiabilitiesMatchOffers;
pub use manager::{FailureInformation, InvariantManager};
pub use ttl_owners::TtlEntriesMatchOwners;
