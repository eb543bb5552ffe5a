//! CART decision trees.
//!
//! [`Tree`] is the shared building block for the decision tree classifier,
//! the random forests and gradient boosting. Nodes live in a flat arena so a
//! fitted tree serializes without nesting, whatever its depth.

use super::{
    Estimator, ProbabilisticClassifier, argmax_labels, check_fit_input, check_width, class_labels,
    encode_labels, not_fitted,
};
use crate::error::Result;
use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand::seq::index::sample;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Minimum impurity decrease for a split to be kept.
const MIN_GAIN: f64 = 1e-12;

/// What a tree predicts at its leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum TreeTask {
    /// Class distribution over `n_classes` encoded labels, Gini impurity.
    Classification { n_classes: usize },
    /// Mean target, squared-error impurity.
    Regression,
}

/// How many features each split considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    All,
    /// `max(1, round(sqrt(n_features)))`, drawn fresh at every node.
    Sqrt,
}

impl MaxFeatures {
    fn count(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt().round() as usize).clamp(1, n_features),
        }
    }
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted tree. Rows with `x[feature] <= threshold` go left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Tree {
    task: TreeTask,
    n_features: usize,
    nodes: Vec<Node>,
}

/// Running impurity statistics for one side of a candidate split.
#[derive(Clone)]
enum SideStats {
    Counts { counts: Vec<f64>, n: f64 },
    Moments { sum: f64, sum_sq: f64, n: f64 },
}

impl SideStats {
    fn empty(task: TreeTask) -> Self {
        match task {
            TreeTask::Classification { n_classes } => SideStats::Counts {
                counts: vec![0.0; n_classes],
                n: 0.0,
            },
            TreeTask::Regression => SideStats::Moments {
                sum: 0.0,
                sum_sq: 0.0,
                n: 0.0,
            },
        }
    }

    fn add(&mut self, y: f64, sign: f64) {
        match self {
            SideStats::Counts { counts, n } => {
                counts[y as usize] += sign;
                *n += sign;
            }
            SideStats::Moments { sum, sum_sq, n } => {
                *sum += sign * y;
                *sum_sq += sign * y * y;
                *n += sign;
            }
        }
    }

    /// Impurity weighted by sample count (n·gini, or the sum of squared errors).
    fn weighted_impurity(&self) -> f64 {
        match self {
            SideStats::Counts { counts, n } => {
                if *n <= 0.0 {
                    return 0.0;
                }
                let sq: f64 = counts.iter().map(|c| (c / n).powi(2)).sum();
                n * (1.0 - sq)
            }
            SideStats::Moments { sum, sum_sq, n } => {
                if *n <= 0.0 {
                    return 0.0;
                }
                (sum_sq - sum * sum / n).max(0.0)
            }
        }
    }

    fn leaf_value(&self) -> Vec<f64> {
        match self {
            SideStats::Counts { counts, n } => counts.iter().map(|c| c / n).collect(),
            SideStats::Moments { sum, n, .. } => vec![sum / n],
        }
    }
}

struct SplitChoice {
    feature: usize,
    threshold: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

struct Builder<'a> {
    x: &'a Array2<f64>,
    y: &'a [f64],
    task: TreeTask,
    params: TreeParams,
    rng: &'a mut ChaCha8Rng,
    nodes: Vec<Node>,
}

impl Builder<'_> {
    fn stats(&self, rows: &[usize]) -> SideStats {
        let mut stats = SideStats::empty(self.task);
        for &r in rows {
            stats.add(self.y[r], 1.0);
        }
        stats
    }

    fn build(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let stats = self.stats(&rows);
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: stats.leaf_value(),
        });

        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        let too_small = rows.len() < self.params.min_samples_split
            || rows.len() < 2 * self.params.min_samples_leaf;
        let parent_impurity = stats.weighted_impurity();
        if depth_reached || too_small || parent_impurity <= MIN_GAIN {
            return id;
        }

        if let Some(choice) = self.best_split(&rows, parent_impurity) {
            let left = self.build(choice.left, depth + 1);
            let right = self.build(choice.right, depth + 1);
            self.nodes[id] = Node::Split {
                feature: choice.feature,
                threshold: choice.threshold,
                left,
                right,
            };
        }
        id
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let n_features = self.x.ncols();
        let k = self.params.max_features.count(n_features);
        if k >= n_features {
            return (0..n_features).collect();
        }
        let mut picked = sample(&mut *self.rng, n_features, k).into_vec();
        picked.sort_unstable();
        picked
    }

    fn best_split(&mut self, rows: &[usize], parent_impurity: f64) -> Option<SplitChoice> {
        let min_leaf = self.params.min_samples_leaf.max(1);
        let n = rows.len();
        let total = self.stats(rows);
        let mut best: Option<(f64, usize, f64)> = None;

        for feature in self.candidate_features() {
            let mut order = rows.to_vec();
            order.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let mut left = SideStats::empty(self.task);
            let mut right = total.clone();
            for i in 0..n - 1 {
                let yi = self.y[order[i]];
                left.add(yi, 1.0);
                right.add(yi, -1.0);

                let lo = self.x[[order[i], feature]];
                let hi = self.x[[order[i + 1], feature]];
                if lo == hi || i + 1 < min_leaf || n - i - 1 < min_leaf {
                    continue;
                }

                let impurity = left.weighted_impurity() + right.weighted_impurity();
                if best.is_none_or(|(b, _, _)| impurity < b) {
                    let mut threshold = lo / 2.0 + hi / 2.0;
                    if threshold >= hi || !threshold.is_finite() {
                        threshold = lo;
                    }
                    best = Some((impurity, feature, threshold));
                }
            }
        }

        let (impurity, feature, threshold) = best?;
        if parent_impurity - impurity <= MIN_GAIN {
            return None;
        }
        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&r| self.x[[r, feature]] <= threshold);
        Some(SplitChoice {
            feature,
            threshold,
            left,
            right,
        })
    }
}

impl Tree {
    /// Grow a tree on the given rows of `x` (duplicates allowed, for bootstraps).
    ///
    /// For classification `y` holds encoded class indices.
    pub fn fit(
        x: &Array2<f64>,
        y: &[f64],
        rows: Vec<usize>,
        task: TreeTask,
        params: TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let mut builder = Builder {
            x,
            y,
            task,
            params,
            rng,
            nodes: Vec::new(),
        };
        builder.build(rows, 0);
        Tree {
            task,
            n_features: x.ncols(),
            nodes: builder.nodes,
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Leaf value reached by one row: class probabilities, or `[mean]`.
    pub fn leaf(&self, row: ArrayView1<f64>) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Regression output per row.
    pub fn predict_values(&self, x: &Array2<f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| self.leaf(row)[0]).collect()
    }

    /// Class distribution per row.
    pub fn predict_distribution(&self, x: &Array2<f64>) -> Array2<f64> {
        let n_classes = match self.task {
            TreeTask::Classification { n_classes } => n_classes,
            TreeTask::Regression => 1,
        };
        let mut out = Array2::<f64>::zeros((x.nrows(), n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (j, p) in self.leaf(row).iter().enumerate() {
                out[[i, j]] = *p;
            }
        }
        out
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }
}

/// Single depth-limited classification tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    max_depth: Option<usize>,
    seed: u64,
    classes: Vec<f64>,
    tree: Option<Tree>,
}

impl DecisionTreeClassifier {
    pub fn new(max_depth: Option<usize>, seed: u64) -> Self {
        Self {
            max_depth,
            seed,
            classes: Vec::new(),
            tree: None,
        }
    }

    /// Depth of the fitted tree.
    pub fn depth(&self) -> Option<usize> {
        self.tree.as_ref().map(Tree::depth)
    }
}

impl Estimator for DecisionTreeClassifier {
    fn name(&self) -> &'static str {
        "dt"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let classes = class_labels(y)?;
        let encoded: Vec<f64> = encode_labels(y, &classes)
            .into_iter()
            .map(|c| c as f64)
            .collect();

        let params = TreeParams {
            max_depth: self.max_depth,
            ..TreeParams::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let task = TreeTask::Classification {
            n_classes: classes.len(),
        };
        self.tree = Some(Tree::fit(x, &encoded, (0..x.nrows()).collect(), task, params, &mut rng));
        self.classes = classes;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(argmax_labels(&self.predict_proba(x)?, &self.classes))
    }
}

impl ProbabilisticClassifier for DecisionTreeClassifier {
    fn classes(&self) -> &[f64] {
        &self.classes
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let tree = self.tree.as_ref().ok_or_else(|| not_fitted("dt"))?;
        check_width(x, tree.n_features())?;
        Ok(tree.predict_distribution(x))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_data;
    use super::*;
    use ndarray::array;

    #[test]
    fn test_tree_splits_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = [0.0, 0.0, 0.0, 5.0, 5.0, 5.0];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = Tree::fit(&x, &y, (0..6).collect(), TreeTask::Regression, TreeParams::default(), &mut rng);

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_values(&array![[2.5], [6.5], [20.0]]), array![0.0, 0.0, 5.0]);
    }

    #[test]
    fn test_classifier_respects_max_depth() {
        let (x, y) = test_data::blobs(40, 11);
        let mut model = DecisionTreeClassifier::new(Some(2), 42);
        model.fit(&x, &y).unwrap();
        assert!(model.depth().unwrap() <= 2);

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 2);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_unbounded_tree_fits_training_data() {
        let (x, y) = test_data::blobs(30, 2);
        let mut model = DecisionTreeClassifier::new(None, 42);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_duplicate_rows_do_not_split() {
        let x = array![[1.0], [1.0], [1.0]];
        let y = [0.0, 1.0, 1.0];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let task = TreeTask::Classification { n_classes: 2 };
        let tree = Tree::fit(&x, &y, vec![0, 1, 2], task, TreeParams::default(), &mut rng);
        assert_eq!(tree.depth(), 0);
        let leaf = tree.leaf(x.row(0));
        assert!((leaf[1] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_max_features_count() {
        assert_eq!(MaxFeatures::Sqrt.count(9), 3);
        assert_eq!(MaxFeatures::Sqrt.count(1), 1);
        assert_eq!(MaxFeatures::All.count(4), 4);
    }
}
