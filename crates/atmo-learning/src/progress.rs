//! Progress reporting types for the trainers.
//!
//! This module defines [`TrainingStage`], [`ProgressUpdate`], and the
//! [`ProgressCallback`] type alias.
//!
//! # Example
//!
//! ```no_run
//! use atmo_learning::{ProgressUpdate, Trainer};
//!
//! let trainer = Trainer::builder()
//!     .on_progress(|update: ProgressUpdate| {
//!         println!(
//!             "[{}] {:.0}% - {}",
//!             update.stage.as_str(),
//!             update.progress * 100.0,
//!             update.message
//!         );
//!     })
//!     .build()
//!     .unwrap();
//! ```

use std::str::FromStr;
use std::sync::Arc;

/// The current stage of a training call.
///
/// The classical trainer moves through these stages in order; the
/// optimizer trainer skips [`Classification`](Self::Classification).
/// Branches whose target column is absent are skipped without an update.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new stages in future versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TrainingStage {
    /// Reading the dataset from disk.
    #[default]
    Loading,

    /// Partitioning rows into train/validation/test.
    Splitting,

    /// Building and fitting the feature transformer.
    Preprocessing,

    /// Fitting and evaluating the rain classifiers.
    Classification,

    /// Fitting and evaluating the regressors.
    Regression,

    /// Writing artifacts and committing the run.
    Persisting,

    /// Training finished; all artifacts are visible.
    Complete,
}

impl TrainingStage {
    /// Returns the snake_case name of the stage.
    ///
    /// # Examples
    ///
    /// ```
    /// use atmo_learning::TrainingStage;
    ///
    /// assert_eq!(TrainingStage::Classification.as_str(), "classification");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStage::Loading => "loading",
            TrainingStage::Splitting => "splitting",
            TrainingStage::Preprocessing => "preprocessing",
            TrainingStage::Classification => "classification",
            TrainingStage::Regression => "regression",
            TrainingStage::Persisting => "persisting",
            TrainingStage::Complete => "complete",
        }
    }

    /// Returns `true` once training has finished.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrainingStage::Complete)
    }
}

/// Error type for parsing a [`TrainingStage`] from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTrainingStageError {
    invalid_value: String,
}

impl ParseTrainingStageError {
    /// Returns the invalid value that caused the parse error.
    #[must_use]
    pub fn invalid_value(&self) -> &str {
        &self.invalid_value
    }
}

impl std::fmt::Display for ParseTrainingStageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid training stage: '{}'. Valid values are: loading, splitting, preprocessing, \
             classification, regression, persisting, complete",
            self.invalid_value
        )
    }
}

impl std::error::Error for ParseTrainingStageError {}

impl FromStr for TrainingStage {
    type Err = ParseTrainingStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loading" => Ok(TrainingStage::Loading),
            "splitting" => Ok(TrainingStage::Splitting),
            "preprocessing" => Ok(TrainingStage::Preprocessing),
            "classification" => Ok(TrainingStage::Classification),
            "regression" => Ok(TrainingStage::Regression),
            "persisting" => Ok(TrainingStage::Persisting),
            "complete" => Ok(TrainingStage::Complete),
            _ => Err(ParseTrainingStageError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

/// A progress update from a trainer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressUpdate {
    /// The current training stage.
    pub stage: TrainingStage,

    /// Overall progress from 0.0 to 1.0, non-decreasing within a call.
    pub progress: f64,

    /// Human-readable status message.
    pub message: String,

    /// Name of the model being fitted, during the model stages.
    pub current_model: Option<String>,
}

impl ProgressUpdate {
    /// Create an update without a current model.
    pub fn new(stage: TrainingStage, progress: f64, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            current_model: None,
        }
    }

    /// Attach the name of the model being fitted.
    #[must_use]
    pub fn with_model(mut self, name: impl Into<String>) -> Self {
        self.current_model = Some(name.into());
        self
    }
}

/// Type alias for a progress callback function.
///
/// Callbacks must be thread-safe (`Send + Sync`) so a trainer can be moved
/// to a worker thread together with its callback.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_stage_roundtrip() {
        let stages = [
            TrainingStage::Loading,
            TrainingStage::Splitting,
            TrainingStage::Preprocessing,
            TrainingStage::Classification,
            TrainingStage::Regression,
            TrainingStage::Persisting,
            TrainingStage::Complete,
        ];

        for stage in stages {
            let parsed: TrainingStage = stage.as_str().parse().unwrap();
            assert_eq!(parsed, stage);
        }
    }

    #[test]
    fn test_training_stage_from_str_error() {
        let err = "explaining".parse::<TrainingStage>().unwrap_err();
        assert_eq!(err.invalid_value(), "explaining");
        assert!(err.to_string().contains("Valid values"));
    }

    #[test]
    fn test_only_complete_is_terminal() {
        assert!(TrainingStage::Complete.is_terminal());
        assert!(!TrainingStage::Persisting.is_terminal());
    }

    #[test]
    fn test_progress_is_clamped() {
        let update = ProgressUpdate::new(TrainingStage::Regression, 1.7, "done").with_model("gbr");
        assert_eq!(update.progress, 1.0);
        assert_eq!(update.current_model.as_deref(), Some("gbr"));
    }

    #[test]
    fn test_progress_update_default() {
        let update = ProgressUpdate::default();
        assert_eq!(update.stage, TrainingStage::Loading);
        assert!(update.message.is_empty());
        assert!(update.current_model.is_none());
    }
}
