//! A fitted preprocessor and estimator applied as one unit.
//!
//! [`FittedPipeline`] is what the classical trainer persists as a
//! `classifier_<name>.joblib` or `regressor_<name>.joblib` artifact. It
//! predicts straight from a feature frame: the frame is checked against the
//! preprocessor's [`FeatureSchema`](atmo_processing::FeatureSchema), encoded,
//! and handed to the estimator.
//!
//! # Example
//!
//! ```rust,ignore
//! use atmo_learning::{ClassifierModel, FittedPipeline};
//!
//! let pipeline: FittedPipeline<ClassifierModel> = store.load("classifier_rf.joblib")?;
//! let rain = pipeline.positive_proba(&row)?;
//! ```

use crate::error::{LearningError, Result};
use crate::models::{Estimator, ProbabilisticClassifier};
use atmo_processing::FittedPreprocessor;
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Preprocessor plus estimator, both fitted on the same training rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipeline<M> {
    preprocessor: FittedPreprocessor,
    model: M,
}

impl<M: Estimator> FittedPipeline<M> {
    /// Fit `model` on an already-encoded training matrix.
    ///
    /// `x` must be the output of `preprocessor.transform` on the training
    /// features; the trainer encodes once and fits every model on it.
    pub fn fit(
        preprocessor: &FittedPreprocessor,
        mut model: M,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<Self> {
        if x.ncols() != preprocessor.n_output_features() {
            return Err(LearningError::FeatureSchemaMismatch(format!(
                "training matrix has {} columns, preprocessor produces {}",
                x.ncols(),
                preprocessor.n_output_features()
            )));
        }
        model.fit(x, y)?;
        Ok(Self {
            preprocessor: preprocessor.clone(),
            model,
        })
    }

    pub fn name(&self) -> &'static str {
        self.model.name()
    }

    pub fn preprocessor(&self) -> &FittedPreprocessor {
        &self.preprocessor
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Encode `features` and predict one value per row.
    pub fn predict(&self, features: &DataFrame) -> Result<Array1<f64>> {
        let x = self.preprocessor.transform(features)?;
        self.model.predict(&x)
    }
}

impl<M: ProbabilisticClassifier> FittedPipeline<M> {
    pub fn predict_proba(&self, features: &DataFrame) -> Result<Array2<f64>> {
        let x = self.preprocessor.transform(features)?;
        self.model.predict_proba(&x)
    }

    /// Probability of the second sorted class (`1` for a 0/1 target).
    pub fn positive_proba(&self, features: &DataFrame) -> Result<Array1<f64>> {
        let proba = self.predict_proba(features)?;
        if proba.ncols() < 2 {
            return Err(LearningError::InferenceError(format!(
                "{} returned {} probability column(s)",
                self.name(),
                proba.ncols()
            )));
        }
        Ok(proba.column(1).to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassifierModel, DecisionTreeClassifier, LinearRegression, RegressorModel};
    use atmo_processing::build_preprocessor;
    use ndarray::array;
    use polars::prelude::*;

    fn frame() -> DataFrame {
        df!(
            "humidity" => &[30.0, 40.0, 85.0, 95.0, 35.0, 90.0],
            "sky" => &["clear", "clear", "cloud", "cloud", "clear", "cloud"]
        )
        .unwrap()
    }

    #[test]
    fn test_classifier_pipeline_predicts_from_frame() {
        let df = frame();
        let pre = build_preprocessor(&df).fit(&df).unwrap();
        let x = pre.transform(&df).unwrap();
        let y = array![0.0, 0.0, 1.0, 1.0, 0.0, 1.0];

        let model = ClassifierModel::Dt(DecisionTreeClassifier::new(Some(3), 42));
        let pipeline = FittedPipeline::fit(&pre, model, &x, &y).unwrap();
        assert_eq!(pipeline.name(), "dt");
        assert_eq!(pipeline.predict(&df).unwrap(), y);

        let p = pipeline.positive_proba(&df).unwrap();
        assert!(p[2] > 0.5 && p[0] < 0.5);
    }

    #[test]
    fn test_positive_proba_reads_class_one_column() {
        let df = df!("humidity" => &[10.0, 12.0, 50.0, 52.0, 90.0, 92.0]).unwrap();
        let pre = build_preprocessor(&df).fit(&df).unwrap();
        let x = pre.transform(&df).unwrap();
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];

        let model = ClassifierModel::Dt(DecisionTreeClassifier::new(Some(3), 42));
        let pipeline = FittedPipeline::fit(&pre, model, &x, &y).unwrap();

        let proba = pipeline.predict_proba(&df).unwrap();
        assert_eq!(proba.ncols(), 3);
        let p = pipeline.positive_proba(&df).unwrap();
        assert_eq!(p, proba.column(1).to_owned());
        assert!(p[2] > 0.5);
        assert!(p[4] < 0.5);
    }

    #[test]
    fn test_pipeline_rejects_frame_with_wrong_kind() {
        let df = frame();
        let pre = build_preprocessor(&df).fit(&df).unwrap();
        let x = pre.transform(&df).unwrap();
        let y = array![10.0, 11.0, 20.0, 21.0, 10.5, 20.5];
        let pipeline =
            FittedPipeline::fit(&pre, RegressorModel::Linr(LinearRegression::new()), &x, &y).unwrap();

        let bad = df!("humidity" => &["wet"], "sky" => &["clear"]).unwrap();
        let err = pipeline.predict(&bad).unwrap_err();
        assert!(matches!(err, LearningError::FeatureSchemaMismatch(_)));
    }

    #[test]
    fn test_pipeline_serde_round_trip() {
        let df = frame();
        let pre = build_preprocessor(&df).fit(&df).unwrap();
        let x = pre.transform(&df).unwrap();
        let y = array![0.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let model = ClassifierModel::Dt(DecisionTreeClassifier::new(Some(3), 42));
        let pipeline = FittedPipeline::fit(&pre, model, &x, &y).unwrap();

        let json = serde_json::to_string(&pipeline).unwrap();
        let back: FittedPipeline<ClassifierModel> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.predict(&df).unwrap(), pipeline.predict(&df).unwrap());
    }
}
