//! Snapshot history configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Minimum number of retained ledgers: the current one.
const MIN_HISTORY_DEPTH: usize = 1;

/// Snapshot retention configuration.
///
/// # Validation Rules
///
/// - `history_depth` must be >= 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SnapshotConfig {
    /// Number of ledgers whose live/archive snapshot pair stays retrievable,
    /// including the current one.
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
}

#[bon::bon]
impl SnapshotConfig {
    /// Creates a new snapshot configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `history_depth` is zero.
    #[builder]
    pub fn new(
        #[builder(default = default_history_depth())] history_depth: usize,
    ) -> Result<Self, ConfigError> {
        let config = Self { history_depth };
        config.validate()?;
        Ok(config)
    }
}

impl SnapshotConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_depth < MIN_HISTORY_DEPTH {
            return Err(ConfigError::Validation {
                message: format!(
                    "history_depth must be >= {MIN_HISTORY_DEPTH}, got {}",
                    self.history_depth
                ),
            });
        }
        Ok(())
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self { history_depth: default_history_depth() }
    }
}

fn default_history_depth() -> usize {
    8
}
