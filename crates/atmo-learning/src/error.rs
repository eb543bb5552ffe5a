//! Error types for the atmo-learning crate.
//!
//! This module defines [`LearningError`], the main error type used throughout
//! the crate. All public API functions return `Result<T, LearningError>`.
//!
//! # Error Tiers
//!
//! Artifact problems are split into three kinds so callers can tell them
//! apart:
//!
//! - [`ArtifactNotFound`](LearningError::ArtifactNotFound): nothing has been
//!   trained yet.
//! - [`ArtifactCorrupt`](LearningError::ArtifactCorrupt): a file exists but
//!   cannot be read or decoded.
//! - [`FeatureSchemaMismatch`](LearningError::FeatureSchemaMismatch): the
//!   input does not match what the model was trained on.
//!
//! [`forecast`](crate::forecast) turns any of them into an absent sub-result;
//! only the not-found case is silent. Training and
//! [`suggest_config`](crate::suggest_config) propagate all three.
//!
//! # Example
//!
//! ```no_run
//! use atmo_learning::{LearningError, TrainingConfig};
//!
//! fn configure() -> Result<TrainingConfig, LearningError> {
//!     // Errors are automatically propagated with ?
//!     let config = TrainingConfig::builder().rf_trees(50).build()?;
//!     Ok(config)
//! }
//! ```

use atmo_processing::ProcessingError;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for atmo-learning operations.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LearningError {
    /// Invalid configuration provided to a trainer.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data provided for training or inference.
    ///
    /// Common causes:
    /// - a partition is empty (dataset too small for the split fractions)
    /// - a classification target has a single class
    /// - a required column is missing from the optimizer dataset
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// An estimator failed to fit.
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// No complete training run provides the requested artifact.
    #[error("Artifact not found: {}", path.display())]
    ArtifactNotFound {
        /// Where the artifact was looked for.
        path: PathBuf,
    },

    /// An artifact exists but could not be read or decoded.
    #[error("Artifact corrupt: {}: {reason}", path.display())]
    ArtifactCorrupt {
        /// The offending file.
        path: PathBuf,
        /// Decoder or I/O message.
        reason: String,
    },

    /// Input rows do not match the feature schema a model was fitted on.
    #[error("Feature schema mismatch: {0}")]
    FeatureSchemaMismatch(String),

    /// A fitted model could not produce a prediction.
    #[error("Inference error: {0}")]
    InferenceError(String),

    /// Dataset loading or preprocessing failed.
    #[error("Processing error: {0}")]
    Processing(ProcessingError),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LearningError {
    /// Returns `true` for the one error kind that callers may treat as "absent".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, LearningError::ArtifactNotFound { .. })
    }

    /// Stable error code, mirroring [`ProcessingError::error_code`].
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::TrainingFailed(_) => "TRAINING_FAILED",
            Self::ArtifactNotFound { .. } => "ARTIFACT_NOT_FOUND",
            Self::ArtifactCorrupt { .. } => "ARTIFACT_CORRUPT",
            Self::FeatureSchemaMismatch(_) => "FEATURE_SCHEMA_MISMATCH",
            Self::InferenceError(_) => "INFERENCE_ERROR",
            Self::Processing(e) => e.error_code(),
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }
}

impl From<ProcessingError> for LearningError {
    fn from(err: ProcessingError) -> Self {
        if err.is_schema_mismatch() {
            LearningError::FeatureSchemaMismatch(err.to_string())
        } else {
            LearningError::Processing(err)
        }
    }
}

impl From<polars::error::PolarsError> for LearningError {
    fn from(err: polars::error::PolarsError) -> Self {
        LearningError::Processing(ProcessingError::Polars(err))
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, LearningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_is_lifted() {
        let err: LearningError = ProcessingError::FeatureSchemaMismatch {
            column: "humidity".to_string(),
            reason: "column is missing".to_string(),
        }
        .with_context("transform")
        .into();
        assert!(matches!(err, LearningError::FeatureSchemaMismatch(_)));
        assert!(err.to_string().contains("humidity"));
    }

    #[test]
    fn test_other_processing_errors_are_wrapped() {
        let err: LearningError = ProcessingError::ColumnNotFound("x".to_string()).into();
        assert!(matches!(err, LearningError::Processing(_)));
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_only_not_found_is_soft() {
        let not_found = LearningError::ArtifactNotFound {
            path: PathBuf::from("models/classifier_rf.joblib"),
        };
        let corrupt = LearningError::ArtifactCorrupt {
            path: PathBuf::from("models/classifier_rf.joblib"),
            reason: "EOF".to_string(),
        };
        assert!(not_found.is_not_found());
        assert!(!corrupt.is_not_found());
        assert!(corrupt.to_string().contains("classifier_rf.joblib"));
    }
}
