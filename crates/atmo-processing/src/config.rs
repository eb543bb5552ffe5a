//! Configuration types for dataset splitting.
//!
//! This module provides split options using the builder pattern
//! for flexible and ergonomic setup.

use serde::{Deserialize, Serialize};

/// Default fraction of rows held out as the test partition.
pub const DEFAULT_TEST_SIZE: f64 = 0.2;

/// Default fraction of rows (of the whole dataset) used for validation.
pub const DEFAULT_VAL_SIZE: f64 = 0.1;

/// Default seed for the shuffling RNG.
pub const DEFAULT_RANDOM_STATE: u64 = 42;

/// Configuration for the train/validation/test splitter.
///
/// Use [`SplitConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust
/// use atmo_processing::config::SplitConfig;
///
/// let config = SplitConfig::builder()
///     .test_size(0.25)
///     .val_size(0.15)
///     .random_state(7)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.random_state, 7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of the whole dataset carved off as test (0.0 - 1.0, exclusive).
    /// Default: 0.2
    pub test_size: f64,

    /// Fraction of the whole dataset used for validation.
    /// Must leave room for training: `test_size + val_size < 1.0`.
    /// Default: 0.1
    pub val_size: f64,

    /// Seed for the shuffling RNG; identical seeds give identical partitions.
    /// Default: 42
    pub random_state: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: DEFAULT_TEST_SIZE,
            val_size: DEFAULT_VAL_SIZE,
            random_state: DEFAULT_RANDOM_STATE,
        }
    }
}

impl SplitConfig {
    /// Create a new configuration builder.
    pub fn builder() -> SplitConfigBuilder {
        SplitConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ConfigValidationError::InvalidFraction {
                field: "test_size".to_string(),
                value: self.test_size,
            });
        }

        if !(self.val_size >= 0.0 && self.val_size < 1.0) {
            return Err(ConfigValidationError::InvalidFraction {
                field: "val_size".to_string(),
                value: self.val_size,
            });
        }

        if self.test_size + self.val_size >= 1.0 {
            return Err(ConfigValidationError::NoTrainingRows {
                test_size: self.test_size,
                val_size: self.val_size,
            });
        }

        Ok(())
    }

    /// Validation fraction relative to the rows left after the test split.
    pub fn relative_val_size(&self) -> f64 {
        self.val_size / (1.0 - self.test_size)
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid fraction for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidFraction { field: String, value: f64 },

    #[error("test_size ({test_size}) + val_size ({val_size}) leaves no rows for training")]
    NoTrainingRows { test_size: f64, val_size: f64 },
}

impl From<ConfigValidationError> for crate::error::ProcessingError {
    fn from(err: ConfigValidationError) -> Self {
        crate::error::ProcessingError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`SplitConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct SplitConfigBuilder {
    test_size: Option<f64>,
    val_size: Option<f64>,
    random_state: Option<u64>,
}

impl SplitConfigBuilder {
    /// Set the test fraction (of the whole dataset).
    pub fn test_size(mut self, size: f64) -> Self {
        self.test_size = Some(size);
        self
    }

    /// Set the validation fraction (of the whole dataset).
    pub fn val_size(mut self, size: f64) -> Self {
        self.val_size = Some(size);
        self
    }

    /// Set the shuffle seed.
    pub fn random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `SplitConfig` or an error if validation fails.
    pub fn build(self) -> Result<SplitConfig, ConfigValidationError> {
        let config = SplitConfig {
            test_size: self.test_size.unwrap_or(DEFAULT_TEST_SIZE),
            val_size: self.val_size.unwrap_or(DEFAULT_VAL_SIZE),
            random_state: self.random_state.unwrap_or(DEFAULT_RANDOM_STATE),
        };

        config.validate()?;
        Ok(config)
    }
}
