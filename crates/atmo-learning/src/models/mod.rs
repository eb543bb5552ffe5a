//! Native estimators for the weather and optimizer models.
//!
//! Every estimator implements [`Estimator`]; classifiers additionally
//! implement [`ProbabilisticClassifier`]. The serializable
//! [`ClassifierModel`] and [`RegressorModel`] enums dispatch to the concrete
//! models so a pipeline artifact can hold any member of the menu.
//!
//! Class labels are kept as the `f64` values they had in the target column
//! (`0.0`/`1.0` for `is_rainy`). `predict_proba` columns follow the sorted
//! label order returned by [`ProbabilisticClassifier::classes`].

mod boosting;
mod forest;
mod linear;
mod svm;
mod tree;

pub use boosting::GradientBoostingRegressor;
pub use forest::{RandomForestClassifier, RandomForestRegressor};
pub use linear::{LinearRegression, LogisticRegression};
pub use svm::Svc;
pub use tree::{DecisionTreeClassifier, MaxFeatures};

use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// A model that can be fitted on a feature matrix and target vector.
pub trait Estimator: Send + Sync {
    /// Short identifier used in artifact names and reports.
    fn name(&self) -> &'static str;

    /// Fit the model, replacing any previous fitted state.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict one value per row (a class label for classifiers).
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

/// A classifier that reports class membership probabilities.
pub trait ProbabilisticClassifier: Estimator {
    /// Sorted distinct labels seen at fit time.
    fn classes(&self) -> &[f64];

    /// One row per sample, one column per entry of [`Self::classes`].
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;
}

/// Sorted distinct labels of a classification target.
///
/// Fails with [`LearningError::InvalidData`] unless at least two classes are present.
pub(crate) fn class_labels(y: &Array1<f64>) -> Result<Vec<f64>> {
    if y.iter().any(|v| !v.is_finite()) {
        return Err(LearningError::InvalidData(
            "classification target contains non-finite values".to_string(),
        ));
    }
    let mut classes: Vec<f64> = y.to_vec();
    classes.sort_by(f64::total_cmp);
    classes.dedup();
    if classes.len() < 2 {
        return Err(LearningError::InvalidData(format!(
            "classification needs at least two classes, found {}",
            classes.len()
        )));
    }
    Ok(classes)
}

/// Map each label to its position in `classes`.
pub(crate) fn encode_labels(y: &Array1<f64>, classes: &[f64]) -> Vec<usize> {
    y.iter()
        .map(|v| {
            classes
                .iter()
                .position(|c| c == v)
                .unwrap_or_default()
        })
        .collect()
}

/// Label with the highest probability in each row; first wins ties.
pub(crate) fn argmax_labels(proba: &Array2<f64>, classes: &[f64]) -> Array1<f64> {
    proba
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            for (j, p) in row.iter().enumerate() {
                if *p > row[best] {
                    best = j;
                }
            }
            classes[best]
        })
        .collect()
}

/// Check `x`/`y` agree on the number of samples and that there is data to fit.
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(LearningError::InvalidData(format!(
            "feature matrix has {} rows but target has {} values",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 {
        return Err(LearningError::InvalidData(
            "cannot fit on an empty training set".to_string(),
        ));
    }
    Ok(())
}

/// Check that a prediction matrix has the fitted width.
pub(crate) fn check_width(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(LearningError::FeatureSchemaMismatch(format!(
            "model expects {} features, got {}",
            n_features,
            x.ncols()
        )));
    }
    Ok(())
}

fn not_fitted(name: &str) -> LearningError {
    LearningError::InferenceError(format!("{name} has not been fitted"))
}

/// The rain classifiers, in a serializable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ClassifierModel {
    Logreg(LogisticRegression),
    Svm(Svc),
    Dt(DecisionTreeClassifier),
    Rf(RandomForestClassifier),
}

impl ClassifierModel {
    fn inner(&self) -> &dyn ProbabilisticClassifier {
        match self {
            ClassifierModel::Logreg(m) => m,
            ClassifierModel::Svm(m) => m,
            ClassifierModel::Dt(m) => m,
            ClassifierModel::Rf(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ProbabilisticClassifier {
        match self {
            ClassifierModel::Logreg(m) => m,
            ClassifierModel::Svm(m) => m,
            ClassifierModel::Dt(m) => m,
            ClassifierModel::Rf(m) => m,
        }
    }
}

impl Estimator for ClassifierModel {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }
}

impl ProbabilisticClassifier for ClassifierModel {
    fn classes(&self) -> &[f64] {
        self.inner().classes()
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.inner().predict_proba(x)
    }
}

/// The temperature regressors, in a serializable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum RegressorModel {
    Linr(LinearRegression),
    Gbr(GradientBoostingRegressor),
}

impl RegressorModel {
    fn inner(&self) -> &dyn Estimator {
        match self {
            RegressorModel::Linr(m) => m,
            RegressorModel::Gbr(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Estimator {
        match self {
            RegressorModel::Linr(m) => m,
            RegressorModel::Gbr(m) => m,
        }
    }
}

impl Estimator for RegressorModel {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }
}

#[cfg(test)]
pub(crate) mod test_data {
    use ndarray::{Array1, Array2};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    /// Two gaussian-ish blobs separated along both axes, labels 0/1.
    pub fn blobs(n_per_class: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n = n_per_class * 2;
        let mut x = Array2::zeros((n, 2));
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let label = (i % 2) as f64;
            let center = if label == 1.0 { 2.0 } else { -2.0 };
            x[[i, 0]] = center + rng.gen_range(-1.0..1.0);
            x[[i, 1]] = center + rng.gen_range(-1.0..1.0);
            y[i] = label;
        }
        (x, y)
    }

    /// `y = 3*x0 - 2*x1 + 1` plus small noise.
    pub fn linear(n: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut x = Array2::zeros((n, 2));
        let mut y = Array1::zeros(n);
        for i in 0..n {
            x[[i, 0]] = rng.gen_range(-5.0..5.0);
            x[[i, 1]] = rng.gen_range(-5.0..5.0);
            y[i] = 3.0 * x[[i, 0]] - 2.0 * x[[i, 1]] + 1.0 + rng.gen_range(-0.01..0.01);
        }
        (x, y)
    }
}
