//! Gradient-boosted regression trees with squared-error loss.

use super::tree::{Tree, TreeParams, TreeTask};
use super::{Estimator, check_fit_input, check_width, not_fitted};
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Additive ensemble of shallow regression trees.
///
/// Starts from the training mean; each stage fits a tree to the current
/// residuals and adds `learning_rate` times its output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    n_stages: usize,
    learning_rate: f64,
    max_depth: usize,
    seed: u64,
    init: f64,
    trees: Vec<Tree>,
}

impl GradientBoostingRegressor {
    /// 100 stages, learning rate 0.1, depth 3.
    pub fn new(seed: u64) -> Self {
        Self {
            n_stages: 100,
            learning_rate: 0.1,
            max_depth: 3,
            seed,
            init: 0.0,
            trees: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_stages(mut self, n_stages: usize) -> Self {
        self.n_stages = n_stages;
        self
    }

    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn n_stages(&self) -> usize {
        self.n_stages
    }
}

impl Estimator for GradientBoostingRegressor {
    fn name(&self) -> &'static str {
        "gbr"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_stages == 0 || self.learning_rate <= 0.0 || self.max_depth == 0 {
            return Err(LearningError::InvalidConfig(
                "boosting needs stages >= 1, learning_rate > 0 and max_depth >= 1".to_string(),
            ));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(LearningError::InvalidData(
                "regression target contains non-finite values".to_string(),
            ));
        }

        let params = TreeParams {
            max_depth: Some(self.max_depth),
            ..TreeParams::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let rows: Vec<usize> = (0..x.nrows()).collect();

        self.init = y.mean().unwrap_or(0.0);
        let mut current = Array1::<f64>::from_elem(x.nrows(), self.init);
        let mut trees = Vec::with_capacity(self.n_stages);
        for _ in 0..self.n_stages {
            let residuals: Vec<f64> = y.iter().zip(current.iter()).map(|(t, c)| t - c).collect();
            let tree = Tree::fit(x, &residuals, rows.clone(), TreeTask::Regression, params, &mut rng);
            current.scaled_add(self.learning_rate, &tree.predict_values(x));
            trees.push(tree);
        }
        self.trees = trees;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let first = self.trees.first().ok_or_else(|| not_fitted("gbr"))?;
        check_width(x, first.n_features())?;

        let mut out = Array1::<f64>::from_elem(x.nrows(), self.init);
        for tree in &self.trees {
            out.scaled_add(self.learning_rate, &tree.predict_values(x));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_data;
    use super::*;

    fn mae(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
        (a - b).mapv(f64::abs).mean().unwrap()
    }

    #[test]
    fn test_more_stages_reduce_training_error() {
        let (x, y) = test_data::linear(150, 9);
        let mut short = GradientBoostingRegressor::new(42).with_stages(5);
        let mut long = GradientBoostingRegressor::new(42);
        short.fit(&x, &y).unwrap();
        long.fit(&x, &y).unwrap();

        let short_err = mae(&short.predict(&x).unwrap(), &y);
        let long_err = mae(&long.predict(&x).unwrap(), &y);
        assert!(long_err < short_err);
        assert!(long_err < 1.5, "training MAE {long_err}");
    }

    #[test]
    fn test_single_stage_starts_at_mean() {
        let x = ndarray::array![[0.0], [1.0]];
        let y = ndarray::array![2.0, 4.0];
        let mut model = GradientBoostingRegressor::new(0).with_stages(1).with_learning_rate(0.5);
        model.fit(&x, &y).unwrap();
        // mean 3, residuals ∓1, half a step
        assert_eq!(model.predict(&x).unwrap(), ndarray::array![2.5, 3.5]);
    }

    #[test]
    fn test_serde_round_trip_predicts_the_same() {
        let (x, y) = test_data::linear(40, 1);
        let mut model = GradientBoostingRegressor::new(42).with_stages(10);
        model.fit(&x, &y).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let back: GradientBoostingRegressor = serde_json::from_str(&json).unwrap();
        assert_eq!(back.predict(&x).unwrap(), model.predict(&x).unwrap());
    }
}
