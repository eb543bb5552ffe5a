//! Ordinary least squares and L2-regularized logistic regression.

use super::{
    Estimator, ProbabilisticClassifier, argmax_labels, check_fit_input, check_width, class_labels,
    not_fitted,
};
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve `a · x = b` for symmetric positive-definite `a` via Cholesky.
///
/// Returns `None` when `a` is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L · y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ · x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Gauss-Jordan inverse with partial pivoting.
fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    let mut aug = Array2::<f64>::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&a, &b| aug[[a, col]].abs().total_cmp(&aug[[b, col]].abs()))
            .unwrap_or(col);
        if pivot_row != col {
            for j in 0..2 * n {
                aug.swap([col, j], [pivot_row, j]);
            }
        }

        let pivot = aug[[col, col]];
        if pivot.abs() < 1e-12 {
            return None;
        }
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }

        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                if factor != 0.0 {
                    for j in 0..2 * n {
                        aug[[row, j]] -= factor * aug[[col, j]];
                    }
                }
            }
        }
    }

    Some(aug.slice(ndarray::s![.., n..]).to_owned())
}

/// Solve a symmetric system, adding a small ridge if it is only semi-definite.
fn solve_symmetric(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    if let Some(x) = cholesky_solve(a, b) {
        return Some(x);
    }

    let n = a.nrows();
    let trace_mean = a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
    let ridge = 1e-8 * trace_mean.max(1.0);
    let mut regularized = a.clone();
    for k in 0..n {
        regularized[[k, k]] += ridge;
    }
    cholesky_solve(&regularized, b).or_else(|| matrix_inverse(a).map(|inv| inv.dot(b)))
}

/// Least-squares linear regression with an intercept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegression {
    coefficients: Option<Array1<f64>>,
    intercept: f64,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fitted coefficients, one per feature.
    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Estimator for LinearRegression {
    fn name(&self) -> &'static str {
        "linr"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;

        // Center so the intercept drops out of the normal equations.
        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| LearningError::InvalidData("empty feature matrix".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let xc = x - &x_mean.view().insert_axis(Axis(0));
        let yc = y - y_mean;

        let xtx = xc.t().dot(&xc);
        let xty = xc.t().dot(&yc);
        let coefficients = solve_symmetric(&xtx, &xty).ok_or_else(|| {
            LearningError::TrainingFailed("normal equations are singular".to_string())
        })?;

        self.intercept = y_mean - coefficients.dot(&x_mean);
        self.coefficients = Some(coefficients);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or_else(|| not_fitted("linr"))?;
        check_width(x, coefficients.len())?;
        Ok(x.dot(coefficients) + self.intercept)
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Binary logistic regression with an L2 penalty on the weights.
///
/// Minimizes `½‖w‖² + C · Σ log-loss` with Newton's method; the intercept is
/// not penalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    c: f64,
    max_iter: usize,
    tol: f64,
    classes: Vec<f64>,
    weights: Option<Array1<f64>>,
    intercept: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-8,
            classes: Vec::new(),
            weights: None,
            intercept: 0.0,
        }
    }

    /// Inverse regularization strength (default: 1.0).
    #[must_use]
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Newton iteration limit (default: 1000).
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    fn positive_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self.weights.as_ref().ok_or_else(|| not_fitted("logreg"))?;
        check_width(x, weights.len())?;
        Ok((x.dot(weights) + self.intercept).mapv(sigmoid))
    }
}

impl Estimator for LogisticRegression {
    fn name(&self) -> &'static str {
        "logreg"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let classes = class_labels(y)?;
        if classes.len() != 2 {
            return Err(LearningError::InvalidData(format!(
                "logistic regression supports binary targets, found {} classes",
                classes.len()
            )));
        }
        if self.c <= 0.0 {
            return Err(LearningError::InvalidConfig("C must be positive".to_string()));
        }

        let (n, p) = x.dim();
        let target: Array1<f64> = y.mapv(|v| if v == classes[1] { 1.0 } else { 0.0 });

        // Design matrix with a trailing column of ones for the intercept.
        let mut design = Array2::<f64>::ones((n, p + 1));
        design.slice_mut(ndarray::s![.., ..p]).assign(x);

        let mut beta = Array1::<f64>::zeros(p + 1);
        let mut converged = false;
        for _ in 0..self.max_iter {
            let proba = design.dot(&beta).mapv(sigmoid);

            let mut grad = design.t().dot(&(&proba - &target)) * self.c;
            for j in 0..p {
                grad[j] += beta[j];
            }

            let w = proba.mapv(|q| (q * (1.0 - q)).max(1e-12));
            let weighted = &design * &w.view().insert_axis(Axis(1));
            let mut hessian = design.t().dot(&weighted) * self.c;
            for j in 0..p {
                hessian[[j, j]] += 1.0;
            }

            let step = solve_symmetric(&hessian, &grad).ok_or_else(|| {
                LearningError::TrainingFailed("logistic regression Hessian is singular".to_string())
            })?;
            beta -= &step;

            if step.iter().all(|s| s.abs() < self.tol) {
                converged = true;
                break;
            }
        }
        if !converged {
            tracing::debug!("logreg reached max_iter={} without converging", self.max_iter);
        }

        self.intercept = beta[p];
        self.weights = Some(beta.slice(ndarray::s![..p]).to_owned());
        self.classes = classes;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(argmax_labels(&self.predict_proba(x)?, &self.classes))
    }
}

impl ProbabilisticClassifier for LogisticRegression {
    fn classes(&self) -> &[f64] {
        &self.classes
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let p1 = self.positive_proba(x)?;
        let mut out = Array2::<f64>::zeros((p1.len(), 2));
        for (i, p) in p1.iter().enumerate() {
            out[[i, 0]] = 1.0 - p;
            out[[i, 1]] = *p;
        }
        Ok(out)
    }
}
