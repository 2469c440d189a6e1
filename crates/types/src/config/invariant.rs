//! Invariant checking configuration.

use std::time::Duration;

use regex::{Regex, RegexBuilder};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Compiles an invariant-name selection pattern.
///
/// The pattern must match the *entire* name and matching ignores case, so
/// `"archived.*"` selects `ArchivedStateConsistency` but `"State"` does not.
///
/// # Errors
///
/// Returns the regex error if `pattern` does not compile on its own. A
/// pattern that only compiles once wrapped, such as `"A)|(B"`, is rejected.
pub fn name_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()?;
    RegexBuilder::new(&format!("^(?:{pattern})$")).case_insensitive(true).build()
}

/// Invariant checking configuration.
///
/// # Validation Rules
///
/// - every entry of `checks` must be non-empty and compile via [`name_pattern`]
/// - both slow-check thresholds must be non-zero
///
/// # Example
///
/// ```no_run
/// # use tiermark_types::config::InvariantConfig;
/// let config = InvariantConfig::builder()
///     .checks(vec!["ArchivedStateConsistency".to_string()])
///     .build()
///     .expect("valid invariant config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InvariantConfig {
    /// Patterns selecting which registered invariants to enable, applied in order.
    #[serde(default)]
    pub checks: Vec<String>,
    /// A ledger-commit check slower than this logs a warning.
    #[serde(default = "default_slow_commit_check_threshold")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub slow_commit_check_threshold: Duration,
    /// A startup scan slower than this logs a warning.
    #[serde(default = "default_slow_startup_check_threshold")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub slow_startup_check_threshold: Duration,
}

#[bon::bon]
impl InvariantConfig {
    /// Creates a new invariant configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if:
    /// - any pattern in `checks` is empty or not a valid regex
    /// - either threshold is zero
    #[builder]
    pub fn new(
        #[builder(default)] checks: Vec<String>,
        #[builder(default = default_slow_commit_check_threshold())]
        slow_commit_check_threshold: Duration,
        #[builder(default = default_slow_startup_check_threshold())]
        slow_startup_check_threshold: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { checks, slow_commit_check_threshold, slow_startup_check_threshold };
        config.validate()?;
        Ok(config)
    }
}

impl InvariantConfig {
    /// Validates the configuration values.
    ///
    /// Call after deserialization so bad patterns are rejected before any
    /// invariant is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, pattern) in self.checks.iter().enumerate() {
            if pattern.is_empty() {
                return Err(ConfigError::Validation {
                    message: format!("checks[{index}] must not be empty"),
                });
            }
            if let Err(e) = name_pattern(pattern) {
                return Err(ConfigError::Validation {
                    message: format!("checks[{index}] '{pattern}' is not a valid regex: {e}"),
                });
            }
        }
        if self.slow_commit_check_threshold.is_zero() {
            return Err(ConfigError::Validation {
                message: "slow_commit_check_threshold must be > 0".to_string(),
            });
        }
        if self.slow_startup_check_threshold.is_zero() {
            return Err(ConfigError::Validation {
                message: "slow_startup_check_threshold must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for InvariantConfig {
    fn default() -> Self {
        Self {
            checks: Vec::new(),
            slow_commit_check_threshold: default_slow_commit_check_threshold(),
            slow_startup_check_threshold: default_slow_startup_check_threshold(),
        }
    }
}

fn default_slow_commit_check_threshold() -> Duration {
    Duration::from_millis(1)
}

fn default_slow_startup_check_threshold() -> Duration {
    Duration::from_secs(1)
}
