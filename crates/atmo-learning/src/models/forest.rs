//! Bagged tree ensembles.
//!
//! Trees are grown on the rayon pool. Tree `i` draws its bootstrap sample and
//! feature subsets from a generator seeded with `seed + i`, so a forest is
//! identical however its trees are scheduled.

use super::tree::{MaxFeatures, Tree, TreeParams, TreeTask};
use super::{
    Estimator, ProbabilisticClassifier, argmax_labels, check_fit_input, check_width, class_labels,
    encode_labels, not_fitted,
};
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

fn grow_forest(
    x: &Array2<f64>,
    y: &[f64],
    n_trees: usize,
    seed: u64,
    task: TreeTask,
    params: TreeParams,
) -> Vec<Tree> {
    let n = x.nrows();
    (0..n_trees)
        .into_par_iter()
        .map(|idx| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(idx as u64));
            let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            Tree::fit(x, y, rows, task, params, &mut rng)
        })
        .collect()
}

fn check_trees(n_trees: usize) -> Result<()> {
    if n_trees == 0 {
        return Err(LearningError::InvalidConfig(
            "a forest needs at least one tree".to_string(),
        ));
    }
    Ok(())
}

/// Random forest classifier: bootstrap samples, `sqrt` features per split,
/// fully grown trees, probabilities averaged over trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    n_trees: usize,
    seed: u64,
    classes: Vec<f64>,
    trees: Vec<Tree>,
}

impl RandomForestClassifier {
    pub fn new(n_trees: usize, seed: u64) -> Self {
        Self {
            n_trees,
            seed,
            classes: Vec::new(),
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.n_trees
    }
}

impl Estimator for RandomForestClassifier {
    fn name(&self) -> &'static str {
        "rf"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        check_trees(self.n_trees)?;
        let classes = class_labels(y)?;
        let encoded: Vec<f64> = encode_labels(y, &classes)
            .into_iter()
            .map(|c| c as f64)
            .collect();

        let params = TreeParams {
            max_features: MaxFeatures::Sqrt,
            ..TreeParams::default()
        };
        let task = TreeTask::Classification {
            n_classes: classes.len(),
        };
        self.trees = grow_forest(x, &encoded, self.n_trees, self.seed, task, params);
        self.classes = classes;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(argmax_labels(&self.predict_proba(x)?, &self.classes))
    }
}

impl ProbabilisticClassifier for RandomForestClassifier {
    fn classes(&self) -> &[f64] {
        &self.classes
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let first = self.trees.first().ok_or_else(|| not_fitted("rf"))?;
        check_width(x, first.n_features())?;

        let mut total = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        for tree in &self.trees {
            total += &tree.predict_distribution(x);
        }
        Ok(total / self.trees.len() as f64)
    }
}

/// Random forest regressor: bootstrap samples, all features per split,
/// fully grown trees, predictions averaged over trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    n_trees: usize,
    seed: u64,
    trees: Vec<Tree>,
}

impl RandomForestRegressor {
    pub fn new(n_trees: usize, seed: u64) -> Self {
        Self {
            n_trees,
            seed,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.n_trees
    }
}

impl Estimator for RandomForestRegressor {
    fn name(&self) -> &'static str {
        "rf"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        check_trees(self.n_trees)?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err(LearningError::InvalidData(
                "regression target contains non-finite values".to_string(),
            ));
        }
        let targets = y.to_vec();
        self.trees = grow_forest(
            x,
            &targets,
            self.n_trees,
            self.seed,
            TreeTask::Regression,
            TreeParams::default(),
        );
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let first = self.trees.first().ok_or_else(|| not_fitted("rf"))?;
        check_width(x, first.n_features())?;

        let mut total = Array1::<f64>::zeros(x.nrows());
        for tree in &self.trees {
            total += &tree.predict_values(x);
        }
        Ok(total / self.trees.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_data;
    use super::*;

    #[test]
    fn test_classifier_is_deterministic() {
        let (x, y) = test_data::blobs(30, 4);
        let mut a = RandomForestClassifier::new(15, 42);
        let mut b = RandomForestClassifier::new(15, 42);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_classifier_accuracy_on_blobs() {
        let (x, y) = test_data::blobs(40, 8);
        let mut model = RandomForestClassifier::new(25, 42);
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        let correct = pred.iter().zip(y.iter()).filter(|(a, b)| a == b).count();
        assert!(correct >= 78);
        assert_eq!(model.classes(), &[0.0, 1.0]);
    }

    #[test]
    fn test_regressor_tracks_linear_target() {
        let (x, y) = test_data::linear(120, 6);
        let mut model = RandomForestRegressor::new(30, 42);
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        let mae = (&pred - &y).mapv(f64::abs).mean().unwrap();
        assert!(mae < 2.0, "training MAE {mae}");
    }

    #[test]
    fn test_zero_trees_is_invalid() {
        let (x, y) = test_data::linear(10, 1);
        let err = RandomForestRegressor::new(0, 42).fit(&x, &y).unwrap_err();
        assert!(matches!(err, LearningError::InvalidConfig(_)));
    }

    #[test]
    fn test_different_seeds_differ() {
        let (x, y) = test_data::linear(60, 2);
        let mut a = RandomForestRegressor::new(5, 1);
        let mut b = RandomForestRegressor::new(5, 2);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_ne!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }
}
