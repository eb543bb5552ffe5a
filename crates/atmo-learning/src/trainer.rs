//! Classical weather model training.
//!
//! [`Trainer`] loads a weather CSV, splits it, fits the feature
//! preprocessor, then fits the rain classifiers and temperature regressors
//! and persists them as one run of the [`ArtifactStore`].
//!
//! # Example
//!
//! ```rust,ignore
//! use atmo_learning::{Trainer, TrainingConfig};
//!
//! let trainer = Trainer::builder()
//!     .config(TrainingConfig::builder().rf_trees(50).build()?)
//!     .on_progress(|u| println!("[{}] {:.0}%", u.stage.as_str(), u.progress * 100.0))
//!     .build()?;
//!
//! let report = trainer.train("data/weather.csv", "models")?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```

use crate::artifacts::{ArtifactStore, REPORT_FILE, RunKind, classifier_artifact, regressor_artifact};
use crate::config::TrainingConfig;
use crate::error::{LearningError, Result};
use crate::metrics::{accuracy, mean_absolute_error};
use crate::models::{
    ClassifierModel, DecisionTreeClassifier, Estimator, GradientBoostingRegressor,
    LinearRegression, LogisticRegression, RandomForestClassifier, RegressorModel, Svc,
};
use crate::pipeline::FittedPipeline;
use crate::progress::{ProgressCallback, ProgressUpdate, TrainingStage};
use crate::types::{ClassificationMetrics, RegressionMetrics, TrainingReport};
use atmo_processing::utils::{has_column, series, series_to_f64};
use atmo_processing::{DATE_COLUMN, build_preprocessor, load_weather_csv, train_val_test_split};
use ndarray::Array1;
use polars::prelude::DataFrame;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Binary rain label column.
pub const RAIN_TARGET: &str = "is_rainy";
/// Continuous temperature column.
pub const TEMP_TARGET: &str = "temp_c";

/// Target column as a vector.
pub(crate) fn target_vector(targets: &DataFrame, name: &str) -> Result<Array1<f64>> {
    Ok(Array1::from_vec(series_to_f64(series(targets, name)?)?))
}

/// Trains the weather models and writes them to an artifact store.
///
/// Use [`Trainer::builder()`] to construct one.
#[derive(Default)]
pub struct Trainer {
    config: TrainingConfig,
    progress_callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("config", &self.config)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Trainer {
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::default()
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub(crate) fn report_progress(&self, update: ProgressUpdate) {
        if let Some(callback) = &self.progress_callback {
            callback(update);
        }
    }

    /// The rain classifier menu, in training order.
    fn classifier_menu(&self) -> Vec<ClassifierModel> {
        let seed = self.config.random_seed;
        vec![
            ClassifierModel::Logreg(LogisticRegression::new()),
            ClassifierModel::Svm(Svc::new(seed)),
            ClassifierModel::Dt(DecisionTreeClassifier::new(Some(self.config.dt_max_depth), seed)),
            ClassifierModel::Rf(RandomForestClassifier::new(self.config.rf_trees, seed)),
        ]
    }

    /// The temperature regressor menu, in training order.
    fn regressor_menu(&self) -> Vec<RegressorModel> {
        vec![
            RegressorModel::Linr(LinearRegression::new()),
            RegressorModel::Gbr(
                GradientBoostingRegressor::new(self.config.random_seed)
                    .with_stages(self.config.gbr_stages),
            ),
        ]
    }

    /// Train every model the dataset has a target for and persist one run.
    ///
    /// Any failure aborts the call before the run is committed, so no
    /// artifact of a failed call is ever visible.
    ///
    /// # Errors
    ///
    /// - [`LearningError::Processing`] if the CSV cannot be read
    /// - [`LearningError::InvalidData`] if a partition is empty, a feature
    ///   column has nulls, or the rain target has a single class
    /// - [`LearningError::Io`] if the run cannot be written
    pub fn train(
        &self,
        dataset_path: impl AsRef<Path>,
        models_dir: impl AsRef<Path>,
    ) -> Result<TrainingReport> {
        let started = Instant::now();
        let dataset_path = dataset_path.as_ref();

        self.report_progress(ProgressUpdate::new(
            TrainingStage::Loading,
            0.0,
            format!("Loading {}", dataset_path.display()),
        ));
        let mut df = load_weather_csv(dataset_path)?;
        if has_column(&df, DATE_COLUMN) {
            df = df.drop(DATE_COLUMN)?;
        }

        self.report_progress(ProgressUpdate::new(
            TrainingStage::Splitting,
            0.1,
            "Splitting dataset",
        ));
        let split = train_val_test_split(&df, &[RAIN_TARGET, TEMP_TARGET], &self.config.split)?;
        if split.validation.is_empty() {
            return Err(LearningError::InvalidData(format!(
                "{} rows leave no validation rows at val_size {}",
                df.height(),
                self.config.split.val_size
            )));
        }

        self.report_progress(ProgressUpdate::new(
            TrainingStage::Preprocessing,
            0.2,
            "Fitting preprocessor",
        ));
        let preprocessor = build_preprocessor(&split.train.features).fit(&split.train.features)?;
        let x_train = preprocessor.transform(&split.train.features)?;
        let x_val = preprocessor.transform(&split.validation.features)?;
        info!(
            "Training on {} rows x {} encoded features ({} validation rows)",
            x_train.nrows(),
            x_train.ncols(),
            x_val.nrows()
        );

        let mut report = TrainingReport::default();
        let mut classifiers = Vec::new();
        let mut regressors = Vec::new();

        if split.train.has_target(RAIN_TARGET) {
            let y_train = target_vector(&split.train.targets, RAIN_TARGET)?;
            let y_val = target_vector(&split.validation.targets, RAIN_TARGET)?;
            let menu = self.classifier_menu();
            let n = menu.len();

            for (i, model) in menu.into_iter().enumerate() {
                let name = model.name();
                self.report_progress(
                    ProgressUpdate::new(
                        TrainingStage::Classification,
                        0.25 + 0.35 * i as f64 / n as f64,
                        format!("Fitting classifier {name}"),
                    )
                    .with_model(name),
                );
                let pipeline = FittedPipeline::fit(&preprocessor, model, &x_train, &y_train)?;
                let val_accuracy = accuracy(&y_val, &pipeline.model().predict(&x_val)?)?;
                debug!("Classifier {}: val_accuracy={:.4}", name, val_accuracy);

                report
                    .classification
                    .insert(name.to_string(), ClassificationMetrics { val_accuracy });
                classifiers.push(pipeline);
            }
        }

        if split.train.has_target(TEMP_TARGET) {
            let y_train = target_vector(&split.train.targets, TEMP_TARGET)?;
            let y_val = target_vector(&split.validation.targets, TEMP_TARGET)?;
            let menu = self.regressor_menu();
            let n = menu.len();

            for (i, model) in menu.into_iter().enumerate() {
                let name = model.name();
                self.report_progress(
                    ProgressUpdate::new(
                        TrainingStage::Regression,
                        0.6 + 0.25 * i as f64 / n as f64,
                        format!("Fitting regressor {name}"),
                    )
                    .with_model(name),
                );
                let pipeline = FittedPipeline::fit(&preprocessor, model, &x_train, &y_train)?;
                let val_mae = mean_absolute_error(&y_val, &pipeline.model().predict(&x_val)?)?;
                debug!("Regressor {}: val_mae={:.4}", name, val_mae);

                report
                    .regression
                    .insert(name.to_string(), RegressionMetrics { val_mae });
                regressors.push(pipeline);
            }
        }

        self.report_progress(ProgressUpdate::new(
            TrainingStage::Persisting,
            0.9,
            "Writing artifacts",
        ));
        let store = ArtifactStore::new(models_dir.as_ref());
        let mut run = store.begin_run(RunKind::Classical)?;
        for pipeline in &classifiers {
            run.write_json(&classifier_artifact(pipeline.name()), pipeline)?;
        }
        for pipeline in &regressors {
            run.write_json(&regressor_artifact(pipeline.name()), pipeline)?;
        }
        run.write_json_pretty(REPORT_FILE, &report)?;
        let manifest = run.commit()?;

        info!(
            "Run {} committed: {} classifiers, {} regressors in {:.2?}",
            manifest.run_id,
            classifiers.len(),
            regressors.len(),
            started.elapsed()
        );
        self.report_progress(ProgressUpdate::new(
            TrainingStage::Complete,
            1.0,
            format!("Training complete ({})", manifest.run_id),
        ));

        Ok(report)
    }
}

/// Builder for [`Trainer`].
#[derive(Default)]
pub struct TrainerBuilder {
    config: Option<TrainingConfig>,
    progress_callback: Option<ProgressCallback>,
}

impl TrainerBuilder {
    /// Use `config` instead of [`TrainingConfig::default()`].
    #[must_use]
    pub fn config(mut self, config: TrainingConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Receive a [`ProgressUpdate`] at each stage boundary and per model.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if an explicitly supplied
    /// configuration does not validate.
    pub fn build(self) -> Result<Trainer> {
        let config = match self.config {
            Some(config) => rebuild(config)?,
            None => TrainingConfig::default(),
        };
        Ok(Trainer {
            config,
            progress_callback: self.progress_callback,
        })
    }
}

/// Run a hand-assembled config back through the validating builder.
fn rebuild(config: TrainingConfig) -> Result<TrainingConfig> {
    TrainingConfig::builder()
        .split(config.split)
        .random_seed(config.random_seed)
        .rf_trees(config.rf_trees)
        .dt_max_depth(config.dt_max_depth)
        .gbr_stages(config.gbr_stages)
        .optimizer_trees(config.optimizer_trees)
        .optimizer_val_size(config.optimizer_val_size)
        .build()
}

/// Train the weather models with the default configuration.
///
/// See [`Trainer::train`].
pub fn train_models(
    dataset_path: impl AsRef<Path>,
    models_dir: impl AsRef<Path>,
) -> Result<TrainingReport> {
    Trainer::default().train(dataset_path, models_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use polars::prelude::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn weather_frame(n: usize) -> DataFrame {
        let humidity: Vec<f64> = (0..n).map(|i| 40.0 + (i * 37 % 55) as f64).collect();
        let wind: Vec<f64> = (0..n).map(|i| (i * 13 % 30) as f64).collect();
        let rainy: Vec<i64> = humidity.iter().map(|h| i64::from(*h > 68.0)).collect();
        let temp: Vec<f64> = humidity.iter().zip(&wind).map(|(h, w)| 30.0 - 0.2 * h - 0.1 * w).collect();
        df!(
            "humidity" => humidity,
            "wind_kph" => wind,
            "is_rainy" => rainy,
            "temp_c" => temp
        )
        .unwrap()
    }

    fn write_csv(dir: &Path, df: &mut DataFrame) -> std::path::PathBuf {
        let path = dir.join("weather.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        CsvWriter::new(&mut file).finish(df).unwrap();
        path
    }

    fn quick_trainer() -> Trainer {
        let config = TrainingConfig::builder().rf_trees(5).gbr_stages(10).build().unwrap();
        Trainer::builder().config(config).build().unwrap()
    }

    #[test]
    fn test_progress_is_monotonic_and_completes() {
        let tmp = TempDir::new().unwrap();
        let csv = write_csv(tmp.path(), &mut weather_frame(40));

        let seen: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let config = TrainingConfig::builder().rf_trees(5).gbr_stages(10).build().unwrap();
        let trainer = Trainer::builder()
            .config(config)
            .on_progress(move |u| sink.lock().unwrap().push(u))
            .build()
            .unwrap();

        trainer.train(&csv, tmp.path().join("models")).unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0].progress <= w[1].progress));
        assert_eq!(seen.last().unwrap().stage, TrainingStage::Complete);
        assert!(seen.iter().any(|u| u.current_model.as_deref() == Some("svm")));
    }

    #[test]
    fn test_single_class_rain_target_aborts_training() {
        let tmp = TempDir::new().unwrap();
        let mut df = weather_frame(20);
        df.with_column(Series::new("is_rainy".into(), vec![0i64; 20])).unwrap();
        let csv = write_csv(tmp.path(), &mut df);
        let err = quick_trainer().train(&csv, tmp.path().join("models")).unwrap_err();
        assert!(matches!(err, LearningError::InvalidData(_)));
        assert!(!tmp.path().join("models").exists());
    }

    #[test]
    fn test_builder_validates_supplied_config() {
        let mut config = TrainingConfig::default();
        config.rf_trees = 0;
        let err = Trainer::builder().config(config).build().unwrap_err();
        assert!(matches!(err, LearningError::InvalidConfig(_)));
    }
}
