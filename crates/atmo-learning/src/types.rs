//! Report, request and response types shared by the trainers, the
//! forecaster and the command-line surface.
//!
//! All types serialize to the JSON shapes written to `ml_report.json` and
//! printed by the `atmo` binary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Validation metrics of one classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Accuracy on the validation partition.
    pub val_accuracy: f64,
}

/// Validation metrics of one regressor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean absolute error on the validation partition.
    pub val_mae: f64,
}

/// Result of [`train_models`](crate::train_models), persisted as `ml_report.json`.
///
/// A mapping is empty when its target column was absent from the dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Model name (`logreg`, `svm`, `dt`, `rf`) to metrics.
    pub classification: BTreeMap<String, ClassificationMetrics>,
    /// Model name (`linr`, `gbr`) to metrics.
    pub regression: BTreeMap<String, RegressionMetrics>,
}

/// Result of [`train_optimizer`](crate::train_optimizer).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerReport {
    /// Mean absolute percentage error on the held-out fifth, as a fraction.
    pub val_mape: f64,
}

/// One input value of a [`FeatureRow`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Text(v.to_string())
    }
}

/// A single prediction input, keyed by column name.
pub type FeatureRow = BTreeMap<String, FeatureValue>;

/// Output of [`forecast`](crate::forecast).
///
/// Each field is `None` when the model behind it has not been trained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Probability of rain from the random forest classifier.
    pub is_rainy_prob: Option<f64>,
    /// Predicted rain label (0 or 1).
    pub is_rainy: Option<i64>,
    /// Predicted temperature from the gradient boosting regressor.
    pub temp_c_pred: Option<f64>,
}

/// Workload characteristics for [`suggest_config`](crate::suggest_config).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigHint {
    pub cpu_util: f64,
    pub mem_gb: f64,
    pub io_throughput_mb_s: f64,
}

impl Default for ConfigHint {
    fn default() -> Self {
        Self {
            cpu_util: 70.0,
            mem_gb: 32.0,
            io_throughput_mb_s: 600.0,
        }
    }
}

/// The grid candidate with the lowest predicted execution time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfigSuggestion {
    pub mpich_version: u32,
    pub nodes: u32,
    pub ppn: u32,
    pub io_block_kb: u32,
    pub hdf5_chunk_kb: u32,
    pub stripe_count: u32,
    pub cpu_util: f64,
    pub mem_gb: f64,
    pub io_throughput_mb_s: f64,
    pub predicted_exec_time_s: f64,
}
