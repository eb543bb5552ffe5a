//! Execution-time model for cluster configuration suggestions.
//!
//! [`train_optimizer`] fits a random forest regressor on an I/O profiling
//! dataset. [`suggest_config`] scores a fixed grid of node and
//! process-per-node counts with that model and returns the fastest.

use crate::artifacts::{ArtifactStore, OPTIMIZER_MODEL, OPTIMIZER_SCALER, RunKind};
use crate::error::{LearningError, Result};
use crate::metrics::mean_absolute_percentage_error;
use crate::models::{Estimator, RandomForestRegressor};
use crate::progress::{ProgressUpdate, TrainingStage};
use crate::trainer::{Trainer, target_vector};
use crate::types::{ConfigHint, ConfigSuggestion, OptimizerReport};
use atmo_processing::utils::has_column;
use atmo_processing::{StandardScaler, load_csv, train_test_split};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Model inputs, in matrix column order.
pub const OPTIMIZER_FEATURES: [&str; 9] = [
    "mpich_version",
    "nodes",
    "ppn",
    "io_block_kb",
    "hdf5_chunk_kb",
    "stripe_count",
    "cpu_util",
    "mem_gb",
    "io_throughput_mb_s",
];

pub const OPTIMIZER_TARGET: &str = "exec_time_s";

/// Candidate node counts, outer grid axis.
pub const GRID_NODES: [u32; 4] = [1, 2, 4, 8];
/// Candidate processes per node, inner grid axis.
pub const GRID_PPN: [u32; 3] = [4, 8, 16];

const MPICH_VERSION: u32 = 381;
const IO_BLOCK_KB: u32 = 256;
const HDF5_CHUNK_KB: u32 = 64;
const STRIPE_COUNT: u32 = 1;

fn feature_names() -> Vec<String> {
    OPTIMIZER_FEATURES.iter().map(|s| s.to_string()).collect()
}

impl Trainer {
    /// Fit the execution-time model and persist it with its scaler.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidData`] if a feature or the target
    /// column is missing, plus the loading and persistence errors of
    /// [`Trainer::train`].
    pub fn train_optimizer(
        &self,
        profiling_path: impl AsRef<Path>,
        models_dir: impl AsRef<Path>,
    ) -> Result<OptimizerReport> {
        let config = self.config();
        let profiling_path = profiling_path.as_ref();

        self.report_progress(ProgressUpdate::new(
            TrainingStage::Loading,
            0.0,
            format!("Loading {}", profiling_path.display()),
        ));
        let df = load_csv(profiling_path)?;
        let missing: Vec<&str> = OPTIMIZER_FEATURES
            .iter()
            .chain(std::iter::once(&OPTIMIZER_TARGET))
            .copied()
            .filter(|name| !has_column(&df, name))
            .collect();
        if !missing.is_empty() {
            return Err(LearningError::InvalidData(format!(
                "profiling dataset is missing column(s): {}",
                missing.join(", ")
            )));
        }

        self.report_progress(ProgressUpdate::new(
            TrainingStage::Splitting,
            0.1,
            "Splitting dataset",
        ));
        let (train, val) = train_test_split(&df, config.optimizer_val_size, config.random_seed)?;

        self.report_progress(ProgressUpdate::new(
            TrainingStage::Preprocessing,
            0.2,
            "Fitting scaler",
        ));
        let scaler = StandardScaler::fit_frame(&train, &feature_names())?;
        let x_train = scaler.transform_frame(&train)?;
        let x_val = scaler.transform_frame(&val)?;
        let y_train = target_vector(&train, OPTIMIZER_TARGET)?;
        let y_val = target_vector(&val, OPTIMIZER_TARGET)?;

        self.report_progress(
            ProgressUpdate::new(
                TrainingStage::Regression,
                0.3,
                format!("Fitting {}-tree forest", config.optimizer_trees),
            )
            .with_model("rf"),
        );
        let mut model = RandomForestRegressor::new(config.optimizer_trees, config.random_seed);
        model.fit(&x_train, &y_train)?;
        let val_mape = mean_absolute_percentage_error(&y_val, &model.predict(&x_val)?)?;
        debug!("Optimizer forest: val_mape={:.4}", val_mape);

        self.report_progress(ProgressUpdate::new(
            TrainingStage::Persisting,
            0.9,
            "Writing artifacts",
        ));
        let store = ArtifactStore::new(models_dir.as_ref());
        let mut run = store.begin_run(RunKind::Optimizer)?;
        run.write_json(OPTIMIZER_MODEL, &model)?;
        run.write_json(OPTIMIZER_SCALER, &scaler)?;
        let manifest = run.commit()?;

        info!(
            "Run {} committed: optimizer on {} rows, val_mape={:.4}",
            manifest.run_id,
            train.height(),
            val_mape
        );
        self.report_progress(ProgressUpdate::new(
            TrainingStage::Complete,
            1.0,
            format!("Training complete ({})", manifest.run_id),
        ));

        Ok(OptimizerReport { val_mape })
    }
}

/// Train the execution-time model with the default configuration.
pub fn train_optimizer(
    profiling_path: impl AsRef<Path>,
    models_dir: impl AsRef<Path>,
) -> Result<OptimizerReport> {
    Trainer::default().train_optimizer(profiling_path, models_dir)
}

/// The 12 grid candidates, nodes-major, with a zero prediction.
fn candidates(hint: &ConfigHint) -> Vec<ConfigSuggestion> {
    GRID_NODES
        .iter()
        .flat_map(|&nodes| {
            GRID_PPN.iter().map(move |&ppn| ConfigSuggestion {
                mpich_version: MPICH_VERSION,
                nodes,
                ppn,
                io_block_kb: IO_BLOCK_KB,
                hdf5_chunk_kb: HDF5_CHUNK_KB,
                stripe_count: STRIPE_COUNT,
                cpu_util: hint.cpu_util,
                mem_gb: hint.mem_gb,
                io_throughput_mb_s: hint.io_throughput_mb_s,
                predicted_exec_time_s: 0.0,
            })
        })
        .collect()
}

fn candidate_frame(grid: &[ConfigSuggestion]) -> Result<DataFrame> {
    let int = |f: fn(&ConfigSuggestion) -> u32| grid.iter().map(|c| f64::from(f(c))).collect::<Vec<_>>();
    let float = |f: fn(&ConfigSuggestion) -> f64| grid.iter().map(f).collect::<Vec<_>>();
    Ok(df!(
        "mpich_version" => int(|c| c.mpich_version),
        "nodes" => int(|c| c.nodes),
        "ppn" => int(|c| c.ppn),
        "io_block_kb" => int(|c| c.io_block_kb),
        "hdf5_chunk_kb" => int(|c| c.hdf5_chunk_kb),
        "stripe_count" => int(|c| c.stripe_count),
        "cpu_util" => float(|c| c.cpu_util),
        "mem_gb" => float(|c| c.mem_gb),
        "io_throughput_mb_s" => float(|c| c.io_throughput_mb_s)
    )?)
}

/// Score every grid candidate and return the one with the lowest predicted
/// execution time; the first candidate wins ties.
///
/// # Errors
///
/// Returns [`LearningError::ArtifactNotFound`] if the optimizer has never
/// been trained into `models_dir`.
pub fn suggest_config(models_dir: impl AsRef<Path>, hint: &ConfigHint) -> Result<ConfigSuggestion> {
    let store = ArtifactStore::new(models_dir.as_ref());
    let model: RandomForestRegressor = store.load(OPTIMIZER_MODEL)?;
    let scaler: StandardScaler = store.load(OPTIMIZER_SCALER)?;

    let mut grid = candidates(hint);
    let x = scaler.transform_frame(&candidate_frame(&grid)?)?;
    let predictions = model.predict(&x)?;

    let mut best = 0;
    for (i, (candidate, predicted)) in grid.iter_mut().zip(predictions.iter()).enumerate() {
        candidate.predicted_exec_time_s = *predicted;
        if *predicted < predictions[best] {
            best = i;
        }
    }

    let choice = grid[best];
    debug!(
        "Suggested nodes={} ppn={} ({:.3}s predicted)",
        choice.nodes, choice.ppn, choice.predicted_exec_time_s
    );
    Ok(choice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_is_nodes_major() {
        let grid = candidates(&ConfigHint::default());
        assert_eq!(grid.len(), 12);
        let pairs: Vec<(u32, u32)> = grid.iter().map(|c| (c.nodes, c.ppn)).collect();
        assert_eq!(&pairs[..4], &[(1, 4), (1, 8), (1, 16), (2, 4)]);
        assert_eq!(pairs[11], (8, 16));
        assert!(grid.iter().all(|c| c.mpich_version == 381 && c.io_block_kb == 256));
    }

    #[test]
    fn test_candidate_frame_has_every_feature() {
        let df = candidate_frame(&candidates(&ConfigHint::default())).unwrap();
        assert_eq!(df.height(), 12);
        for name in OPTIMIZER_FEATURES {
            assert!(has_column(&df, name), "missing {name}");
        }
    }
}
