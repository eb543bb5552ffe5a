//! Configuration types for training and for the application environment.
//!
//! This module provides [`TrainingConfig`] and its builder for tuning the
//! trainers, and [`AppConfig`] for locating models, data and the prediction
//! log.
//!
//! # Example
//!
//! ```
//! use atmo_learning::TrainingConfig;
//!
//! let config = TrainingConfig::builder()
//!     .random_seed(7)
//!     .rf_trees(50)
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.rf_trees, 50);
//! ```

use crate::error::LearningError;
use atmo_processing::SplitConfig;
use std::path::PathBuf;

/// Environment variable naming the models directory.
pub const ENV_MODELS_DIR: &str = "ATMO_MODELS_DIR";
/// Environment variable naming the data directory.
pub const ENV_DATA_DIR: &str = "ATMO_DATA_DIR";
/// Environment variable naming the prediction log file.
pub const ENV_PREDICTION_LOG: &str = "ATMO_PREDICTION_LOG";

/// Settings for the classical and optimizer trainers.
///
/// Use [`TrainingConfig::builder()`] to construct a configuration with the
/// builder pattern. The defaults reproduce the reference model menu.
///
/// # Validation
///
/// The builder validates the following constraints on [`build()`](TrainingConfigBuilder::build):
/// - the split fractions satisfy [`SplitConfig::validate`]
/// - `rf_trees`, `gbr_stages` and `optimizer_trees` are at least 1
/// - `dt_max_depth` is at least 1
/// - `optimizer_val_size` is in range `(0.0, 1.0)` (exclusive)
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    /// Train/validation/test fractions and the split seed.
    pub split: SplitConfig,

    /// Seed for stochastic estimators (default: 42).
    pub random_seed: u64,

    /// Number of trees in the rain random forest (default: 200).
    pub rf_trees: usize,

    /// Maximum depth of the rain decision tree (default: 6).
    pub dt_max_depth: usize,

    /// Boosting stages for the temperature regressor (default: 100).
    pub gbr_stages: usize,

    /// Number of trees in the execution-time forest (default: 100).
    pub optimizer_trees: usize,

    /// Validation fraction of the optimizer's single split (default: 0.2).
    pub optimizer_val_size: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            split: SplitConfig::default(),
            random_seed: 42,
            rf_trees: 200,
            dt_max_depth: 6,
            gbr_stages: 100,
            optimizer_trees: 100,
            optimizer_val_size: 0.2,
        }
    }
}

impl TrainingConfig {
    /// Create a new builder for `TrainingConfig`.
    #[must_use]
    pub fn builder() -> TrainingConfigBuilder {
        TrainingConfigBuilder::default()
    }
}

/// Builder for [`TrainingConfig`].
///
/// Created via [`TrainingConfig::builder()`]. All setters return `self` to
/// allow method chaining.
#[derive(Debug, Clone, Default)]
pub struct TrainingConfigBuilder {
    config: TrainingConfig,
}

impl TrainingConfigBuilder {
    /// Set the split fractions and seed.
    #[must_use]
    pub fn split(mut self, split: SplitConfig) -> Self {
        self.config.split = split;
        self
    }

    /// Set the estimator seed (default: 42).
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Set the number of random forest trees (default: 200).
    #[must_use]
    pub fn rf_trees(mut self, n: usize) -> Self {
        self.config.rf_trees = n;
        self
    }

    /// Set the decision tree depth limit (default: 6).
    #[must_use]
    pub fn dt_max_depth(mut self, depth: usize) -> Self {
        self.config.dt_max_depth = depth;
        self
    }

    /// Set the number of boosting stages (default: 100).
    #[must_use]
    pub fn gbr_stages(mut self, n: usize) -> Self {
        self.config.gbr_stages = n;
        self
    }

    /// Set the number of optimizer forest trees (default: 100).
    #[must_use]
    pub fn optimizer_trees(mut self, n: usize) -> Self {
        self.config.optimizer_trees = n;
        self
    }

    /// Set the optimizer validation fraction (default: 0.2).
    #[must_use]
    pub fn optimizer_val_size(mut self, size: f64) -> Self {
        self.config.optimizer_val_size = size;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if any constraint listed on
    /// [`TrainingConfig`] is violated.
    pub fn build(self) -> Result<TrainingConfig, LearningError> {
        self.config
            .split
            .validate()
            .map_err(|e| LearningError::InvalidConfig(e.to_string()))?;

        if self.config.rf_trees == 0 {
            return Err(LearningError::InvalidConfig(
                "rf_trees must be at least 1".to_string(),
            ));
        }

        if self.config.dt_max_depth == 0 {
            return Err(LearningError::InvalidConfig(
                "dt_max_depth must be at least 1".to_string(),
            ));
        }

        if self.config.gbr_stages == 0 {
            return Err(LearningError::InvalidConfig(
                "gbr_stages must be at least 1".to_string(),
            ));
        }

        if self.config.optimizer_trees == 0 {
            return Err(LearningError::InvalidConfig(
                "optimizer_trees must be at least 1".to_string(),
            ));
        }

        let v = self.config.optimizer_val_size;
        if v <= 0.0 || v >= 1.0 {
            return Err(LearningError::InvalidConfig(
                "optimizer_val_size must be between 0.0 and 1.0 (exclusive)".to_string(),
            ));
        }

        Ok(self.config)
    }
}

/// Filesystem locations used by the command-line surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Root of the artifact store.
    pub models_dir: PathBuf,
    /// Directory holding datasets.
    pub data_dir: PathBuf,
    /// JSON Lines file that receives prediction records.
    pub prediction_log: PathBuf,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first, if present.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let models_dir = non_empty(ENV_MODELS_DIR).map_or_else(|| PathBuf::from("models"), PathBuf::from);
        let data_dir = non_empty(ENV_DATA_DIR).map_or_else(|| PathBuf::from("data"), PathBuf::from);
        let prediction_log = non_empty(ENV_PREDICTION_LOG)
            .map_or_else(|| data_dir.join("predictions.jsonl"), PathBuf::from);

        Self {
            models_dir,
            data_dir,
            prediction_log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.rf_trees, 200);
        assert_eq!(config.dt_max_depth, 6);
        assert_eq!(config.gbr_stages, 100);
        assert_eq!(config.optimizer_trees, 100);
        assert_eq!(config.split, SplitConfig::default());
    }

    #[test]
    fn test_builder() {
        let config = TrainingConfig::builder()
            .random_seed(1)
            .rf_trees(10)
            .dt_max_depth(3)
            .gbr_stages(20)
            .optimizer_trees(5)
            .optimizer_val_size(0.25)
            .build()
            .unwrap();

        assert_eq!(config.random_seed, 1);
        assert_eq!(config.rf_trees, 10);
        assert_eq!(config.dt_max_depth, 3);
        assert_eq!(config.gbr_stages, 20);
        assert_eq!(config.optimizer_trees, 5);
        assert!((config.optimizer_val_size - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_counts() {
        let err = TrainingConfig::builder().rf_trees(0).build().unwrap_err();
        assert!(err.to_string().contains("rf_trees"));

        let err = TrainingConfig::builder().dt_max_depth(0).build().unwrap_err();
        assert!(err.to_string().contains("dt_max_depth"));

        let err = TrainingConfig::builder().gbr_stages(0).build().unwrap_err();
        assert!(err.to_string().contains("gbr_stages"));
    }

    #[test]
    fn test_invalid_optimizer_val_size() {
        for bad in [0.0, 1.0, -0.5] {
            let result = TrainingConfig::builder().optimizer_val_size(bad).build();
            assert!(matches!(result, Err(LearningError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_invalid_split_is_rejected() {
        let split = SplitConfig {
            test_size: 0.7,
            val_size: 0.5,
            random_state: 42,
        };
        let result = TrainingConfig::builder().split(split).build();
        assert!(matches!(result, Err(LearningError::InvalidConfig(_))));
    }

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.models_dir, PathBuf::from("models"));
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.prediction_log, PathBuf::from("data/predictions.jsonl"));
    }

    #[test]
    fn test_app_config_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_MODELS_DIR, "/srv/models"),
            (ENV_DATA_DIR, "/srv/data"),
            (ENV_PREDICTION_LOG, ""),
        ]
        .into_iter()
        .collect();
        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.models_dir, PathBuf::from("/srv/models"));
        assert_eq!(
            config.prediction_log,
            PathBuf::from("/srv/data/predictions.jsonl")
        );
    }
}
