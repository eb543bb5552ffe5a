//! atmo-learning: weather model training, forecasting and cluster
//! configuration suggestions.
//!
//! This crate trains a menu of classical models on a weather dataset,
//! serves point predictions from the latest trained models, and trains and
//! queries an execution-time model that recommends cluster configurations.
//! All estimators are implemented natively on `ndarray`; datasets are
//! loaded and encoded by [`atmo_processing`].
//!
//! # Features
//!
//! - **Classical training**: logistic regression, RBF SVM, decision tree and
//!   random forest for rain; OLS and gradient boosting for temperature
//! - **Forecasting**: rain probability and temperature for a single row
//! - **Configuration search**: grid search over nodes and processes per node
//! - **Artifact store**: atomically committed runs, superseded runs pruned
//! - **Progress Reporting**: stage callbacks during training
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use atmo_learning::{ConfigHint, FeatureRow, forecast, suggest_config, train_models, train_optimizer};
//!
//! let report = train_models("data/weather.csv", "models")?;
//! println!("rf accuracy: {}", report.classification["rf"].val_accuracy);
//!
//! let result = forecast(&FeatureRow::new(), "models")?;
//!
//! train_optimizer("data/profiling.csv", "models")?;
//! let best = suggest_config("models", &ConfigHint::default())?;
//! println!("run on {} nodes x {} ppn", best.nodes, best.ppn);
//! ```
//!
//! # Architecture
//!
//! ```text
//! weather.csv ──► load ──► split ──► preprocessor ──► models ──┐
//!                                                              ▼
//!                                   models_dir/runs/<run_id>/{*.joblib, ml_report.json, MANIFEST.json}
//!                                                              │
//! FeatureRow ──────────────────────► forecast ◄────────────────┘
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, LearningError>`]. Only
//! [`LearningError::ArtifactNotFound`] is treated as "absent" by
//! [`forecast`]; a corrupt artifact or a row that does not match the
//! trained feature schema is always an error. See [`LearningError`].
//!
//! # Thread Safety
//!
//! Training is sequential apart from random forests, which grow their trees
//! on the rayon pool with per-tree seeds. Readers resolve artifacts through
//! committed manifests only, so a forecast running alongside a training call
//! sees either the previous run or the new one.

pub mod artifacts;
mod config;
mod error;
mod forecast;
pub mod metrics;
pub mod models;
mod optimizer;
mod pipeline;
mod progress;
mod records;
mod trainer;
mod types;

// Re-export public API
//
// Configuration types
pub use atmo_processing::SplitConfig;
pub use config::{AppConfig, TrainingConfig, TrainingConfigBuilder};
// Error types
pub use error::{LearningError, Result};
// Artifact store
pub use artifacts::{ArtifactStore, RunKind, RunManifest};
// Models
pub use models::{ClassifierModel, Estimator, ProbabilisticClassifier, RegressorModel};
pub use pipeline::FittedPipeline;
// Progress reporting types
pub use progress::{ProgressCallback, ProgressUpdate, TrainingStage};
// Prediction log
pub use records::{PredictionLog, PredictionRecord};
// Result and request types
pub use types::{
    ClassificationMetrics, ConfigHint, ConfigSuggestion, FeatureRow, FeatureValue, Forecast,
    OptimizerReport, RegressionMetrics, TrainingReport,
};
// Entry points
pub use forecast::{EXPECTED_FEATURES, forecast};
pub use optimizer::{OPTIMIZER_FEATURES, OPTIMIZER_TARGET, suggest_config, train_optimizer};
pub use trainer::{RAIN_TARGET, TEMP_TARGET, Trainer, TrainerBuilder, train_models};

// Trainers and stored models are handed to worker threads by callers.
static_assertions::assert_impl_all!(Trainer: Send, Sync);
static_assertions::assert_impl_all!(FittedPipeline<ClassifierModel>: Send, Sync);
static_assertions::assert_impl_all!(FittedPipeline<RegressorModel>: Send, Sync);
static_assertions::assert_impl_all!(LearningError: Send, Sync);
