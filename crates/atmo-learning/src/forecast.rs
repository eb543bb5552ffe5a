//! Point predictions from the latest trained weather models.

use crate::artifacts::{ArtifactStore, classifier_artifact, regressor_artifact};
use crate::error::Result;
use crate::models::{ClassifierModel, RegressorModel};
use crate::pipeline::FittedPipeline;
use crate::types::{FeatureRow, FeatureValue, Forecast};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, warn};

/// Keys that default to `0` when absent from the input row.
pub const EXPECTED_FEATURES: [&str; 5] = ["temp_c", "humidity", "wind_kph", "pressure_hpa", "rain_mm"];

const RAIN_MODEL: &str = "rf";
const TEMP_MODEL: &str = "gbr";

/// One-row frame from `row`, with the expected keys filled in.
fn feature_frame(row: &FeatureRow) -> Result<DataFrame> {
    let mut row = row.clone();
    for name in EXPECTED_FEATURES {
        row.entry(name.to_string()).or_insert(FeatureValue::Number(0.0));
    }

    let columns: Vec<Column> = row
        .iter()
        .map(|(name, value)| match value {
            FeatureValue::Number(v) => Column::new(name.as_str().into(), [*v]),
            FeatureValue::Text(s) => Column::new(name.as_str().into(), [s.as_str()]),
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Reduce one model's outcome to an optional value.
///
/// An untrained model is expected and stays quiet. Any other failure is
/// logged with its error code.
fn settle<T>(target: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_not_found() => {
            debug!("No trained model for {}: {}", target, e);
            None
        }
        Err(e) => {
            warn!(code = e.error_code(), "Leaving {} empty: {}", target, e);
            None
        }
    }
}

fn rain_prediction(store: &ArtifactStore, features: &DataFrame) -> Result<(f64, i64)> {
    let pipeline: FittedPipeline<ClassifierModel> = store.load(&classifier_artifact(RAIN_MODEL))?;
    let prob = pipeline.positive_proba(features)?[0];
    let label = pipeline.predict(features)?[0];
    Ok((prob, label.round() as i64))
}

fn temp_prediction(store: &ArtifactStore, features: &DataFrame) -> Result<f64> {
    let pipeline: FittedPipeline<RegressorModel> = store.load(&regressor_artifact(TEMP_MODEL))?;
    Ok(pipeline.predict(features)?[0])
}

/// Predict rain and temperature for a single row.
///
/// The rain classifier and temperature regressor are loaded from disk on
/// every call, and each is handled on its own: whatever keeps one model
/// from answering (never trained, corrupt artifact, a row it cannot read)
/// leaves only that model's fields `None`. Only a row that cannot be turned
/// into a frame fails the call.
///
/// # Example
///
/// ```rust,ignore
/// use atmo_learning::{FeatureRow, forecast};
///
/// let row: FeatureRow = serde_json::from_str(r#"{"humidity": 88, "pressure_hpa": 1002}"#)?;
/// let result = forecast(&row, "models")?;
/// ```
pub fn forecast(row: &FeatureRow, models_dir: impl AsRef<Path>) -> Result<Forecast> {
    let store = ArtifactStore::new(models_dir.as_ref());
    let features = feature_frame(row)?;
    let mut result = Forecast::default();

    if let Some((prob, label)) = settle("is_rainy", rain_prediction(&store, &features)) {
        result.is_rainy_prob = Some(prob);
        result.is_rainy = Some(label);
    }
    result.temp_c_pred = settle("temp_c", temp_prediction(&store, &features));

    debug!("Forecast: {:?}", result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LinearRegression;
    use atmo_processing::build_preprocessor;
    use atmo_processing::utils::{has_column, series};
    use ndarray::array;
    use tempfile::TempDir;

    /// A store whose classifier artifact is garbage and whose regressor works.
    fn store_with_corrupt_classifier(root: &Path) -> ArtifactStore {
        let df = df!(
            "temp_c" => &[10.0, 12.0, 15.0, 18.0, 20.0, 22.0, 25.0, 27.0],
            "humidity" => &[80.0, 75.0, 70.0, 66.0, 60.0, 55.0, 50.0, 45.0],
            "wind_kph" => &[5.0, 9.0, 4.0, 12.0, 7.0, 3.0, 11.0, 6.0],
            "pressure_hpa" => &[1002.0, 1010.0, 1005.0, 1015.0, 1008.0, 1012.0, 1004.0, 1018.0],
            "rain_mm" => &[3.0, 0.0, 1.0, 0.0, 2.0, 0.0, 0.5, 0.0]
        )
        .unwrap();
        let pre = build_preprocessor(&df).fit(&df).unwrap();
        let x = pre.transform(&df).unwrap();
        let y = array![11.0, 13.0, 16.0, 19.0, 21.0, 23.0, 26.0, 28.0];
        let regressor =
            FittedPipeline::fit(&pre, RegressorModel::Linr(LinearRegression::new()), &x, &y).unwrap();

        let store = ArtifactStore::new(root);
        let mut run = store.begin_run(crate::artifacts::RunKind::Classical).unwrap();
        run.write_json(&classifier_artifact(RAIN_MODEL), &"not a model").unwrap();
        run.write_json(&regressor_artifact(TEMP_MODEL), &regressor).unwrap();
        run.commit().unwrap();
        store
    }

    #[test]
    fn test_empty_row_gets_expected_zeros() {
        let df = feature_frame(&FeatureRow::new()).unwrap();
        assert_eq!(df.height(), 1);
        for name in EXPECTED_FEATURES {
            let s = series(&df, name).unwrap();
            assert_eq!(s.f64().unwrap().get(0), Some(0.0));
        }
    }

    #[test]
    fn test_extra_keys_keep_their_type() {
        let mut row = FeatureRow::new();
        row.insert("humidity".to_string(), 91.0.into());
        row.insert("condition".to_string(), "fog".into());
        let df = feature_frame(&row).unwrap();

        assert!(has_column(&df, "condition"));
        assert_eq!(series(&df, "condition").unwrap().dtype(), &DataType::String);
        assert_eq!(series(&df, "humidity").unwrap().f64().unwrap().get(0), Some(91.0));
    }

    #[test]
    fn test_corrupt_classifier_leaves_regressor_working() {
        let tmp = TempDir::new().unwrap();
        store_with_corrupt_classifier(tmp.path());

        let result = forecast(&FeatureRow::new(), tmp.path()).unwrap();
        assert_eq!(result.is_rainy_prob, None);
        assert_eq!(result.is_rainy, None);
        assert!(result.temp_c_pred.unwrap().is_finite());
    }

    #[test]
    fn test_mistyped_feature_empties_the_affected_model() {
        let tmp = TempDir::new().unwrap();
        store_with_corrupt_classifier(tmp.path());

        let mut row = FeatureRow::new();
        row.insert("humidity".to_string(), "very".into());
        let result = forecast(&row, tmp.path()).unwrap();
        assert_eq!(result, Forecast::default());
    }

    #[test]
    fn test_settle_keeps_values_and_drops_errors() {
        assert_eq!(settle("x", Ok(3)), Some(3));
        let missing: Result<i32> = Err(crate::error::LearningError::ArtifactNotFound {
            path: "m/x.joblib".into(),
        });
        assert_eq!(settle("x", missing), None);
        let broken: Result<i32> = Err(crate::error::LearningError::InferenceError("nan".into()));
        assert_eq!(settle("x", broken), None);
    }

    #[test]
    fn test_untrained_store_yields_empty_forecast() {
        let tmp = TempDir::new().unwrap();
        let result = forecast(&FeatureRow::new(), tmp.path().join("nothing-here")).unwrap();
        assert_eq!(result, Forecast::default());
    }
}
