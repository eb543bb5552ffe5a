//! RBF-kernel support vector classifier with Platt-scaled probabilities.

use super::{
    Estimator, ProbabilisticClassifier, check_fit_input, check_width, class_labels, not_fitted,
};
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// Memory set aside for cached kernel rows during training.
const KERNEL_CACHE_BYTES: usize = 256 * 1024 * 1024;

/// Consecutive sweeps without an alpha update before SMO stops.
const MAX_QUIET_PASSES: usize = 5;

fn rbf(a: ArrayView1<f64>, b: ArrayView1<f64>, gamma: f64) -> f64 {
    let dist: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    (-gamma * dist).exp()
}

/// Kernel rows computed on demand, keeping at most `capacity` of them.
///
/// The oldest row is evicted first. RBF kernels have a unit diagonal, so
/// `K(i, i)` never needs a row.
struct KernelRows<'a> {
    x: &'a Array2<f64>,
    gamma: f64,
    capacity: usize,
    rows: HashMap<usize, Rc<[f64]>>,
    order: VecDeque<usize>,
}

impl<'a> KernelRows<'a> {
    fn new(x: &'a Array2<f64>, gamma: f64, capacity: usize) -> Self {
        Self {
            x,
            gamma,
            capacity: capacity.max(2),
            rows: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// As many rows as fit in [`KERNEL_CACHE_BYTES`].
    fn with_default_budget(x: &'a Array2<f64>, gamma: f64) -> Self {
        let row_bytes = x.nrows().max(1) * std::mem::size_of::<f64>();
        Self::new(x, gamma, KERNEL_CACHE_BYTES / row_bytes)
    }

    fn entry(&self, i: usize, j: usize) -> f64 {
        match self.rows.get(&i) {
            Some(row) => row[j],
            None => rbf(self.x.row(i), self.x.row(j), self.gamma),
        }
    }

    fn row(&mut self, i: usize) -> Rc<[f64]> {
        if let Some(row) = self.rows.get(&i) {
            return Rc::clone(row);
        }
        if self.rows.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.rows.remove(&oldest);
            }
        }
        let xi = self.x.row(i);
        let row: Rc<[f64]> = self
            .x
            .rows()
            .into_iter()
            .map(|xk| rbf(xi, xk, self.gamma))
            .collect();
        self.rows.insert(i, Rc::clone(&row));
        self.order.push_back(i);
        row
    }
}

/// `1 / (n_features · Var(X))` over all entries of `x`, or 1 for constant data.
fn scale_gamma(x: &Array2<f64>) -> f64 {
    let var = x.var(0.0);
    if var > 0.0 && var.is_finite() {
        1.0 / (x.ncols() as f64 * var)
    } else {
        1.0
    }
}

/// Sigmoid fit `P(y=1 | f) = 1 / (1 + exp(A·f + B))` on decision values.
///
/// Newton's method with backtracking, using smoothed targets.
fn platt_fit(dec: &[f64], positive: &[bool]) -> (f64, f64) {
    let prior1 = positive.iter().filter(|p| **p).count() as f64;
    let prior0 = positive.len() as f64 - prior1;
    let hi = (prior1 + 1.0) / (prior1 + 2.0);
    let lo = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = positive.iter().map(|&p| if p { hi } else { lo }).collect();

    let objective = |a: f64, b: f64| -> f64 {
        dec.iter()
            .zip(&targets)
            .map(|(f, t)| {
                let z = f * a + b;
                if z >= 0.0 {
                    t * z + (-z).exp().ln_1p()
                } else {
                    (t - 1.0) * z + z.exp().ln_1p()
                }
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    for _ in 0..100 {
        let (mut h11, mut h22, mut h21) = (1e-12, 1e-12, 0.0);
        let (mut g1, mut g2) = (0.0, 0.0);
        for (f, t) in dec.iter().zip(&targets) {
            let z = f * a + b;
            let (p, q) = if z >= 0.0 {
                let e = (-z).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = z.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = t - p;
            g1 += f * d1;
            g2 += d1;
        }
        if g1.abs() < 1e-5 && g2.abs() < 1e-5 {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= 1e-10 {
            let (na, nb) = (a + step * da, b + step * db);
            let nf = objective(na, nb);
            if nf < fval + 1e-4 * step * gd {
                a = na;
                b = nb;
                fval = nf;
                break;
            }
            step /= 2.0;
        }
        if step < 1e-10 {
            break;
        }
    }
    (a, b)
}

fn platt_proba(f: f64, a: f64, b: f64) -> f64 {
    let z = f * a + b;
    if z >= 0.0 {
        let e = (-z).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + z.exp())
    }
}

/// Binary C-SVC with an RBF kernel and `gamma = "scale"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Svc {
    c: f64,
    tol: f64,
    max_iter: usize,
    seed: u64,
    gamma: f64,
    classes: Vec<f64>,
    support_vectors: Option<Array2<f64>>,
    dual_coef: Vec<f64>,
    bias: f64,
    platt: (f64, f64),
}

impl Svc {
    pub fn new(seed: u64) -> Self {
        Self {
            c: 1.0,
            tol: 1e-3,
            max_iter: 1000,
            seed,
            gamma: 0.0,
            classes: Vec::new(),
            support_vectors: None,
            dual_coef: Vec::new(),
            bias: 0.0,
            platt: (0.0, 0.0),
        }
    }

    /// Penalty parameter (default: 1.0).
    #[must_use]
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Upper bound on SMO sweeps over the training rows (default: 1000).
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    pub fn n_support_vectors(&self) -> usize {
        self.dual_coef.len()
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Signed distance-like score; positive means the second class.
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let sv = self.support_vectors.as_ref().ok_or_else(|| not_fitted("svm"))?;
        check_width(x, sv.ncols())?;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                sv.rows()
                    .into_iter()
                    .zip(&self.dual_coef)
                    .map(|(s, coef)| coef * rbf(s, row, self.gamma))
                    .sum::<f64>()
                    + self.bias
            })
            .collect())
    }

    /// Sequential minimal optimization with kernel rows fetched on demand.
    ///
    /// Returns `(alphas, bias, f)` where `f[i] = Σ_k α_k y_k K(k, i)`.
    fn smo(&self, kernel: &mut KernelRows<'_>, y: &[f64]) -> (Vec<f64>, f64, Vec<f64>) {
        let n = y.len();
        let c = self.c;
        let mut alphas = vec![0.0; n];
        let mut bias = 0.0;
        // Σ_k α_k y_k K(k, i), kept in step with the alphas.
        let mut f = vec![0.0; n];
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let mut quiet = 0;
        let mut iter = 0;
        while quiet < MAX_QUIET_PASSES && iter < self.max_iter && n > 1 {
            let mut changed = 0;
            for i in 0..n {
                let e_i = f[i] + bias - y[i];
                let violates = (y[i] * e_i < -self.tol && alphas[i] < c)
                    || (y[i] * e_i > self.tol && alphas[i] > 0.0);
                if !violates {
                    continue;
                }

                let j = loop {
                    let j = rng.gen_range(0..n);
                    if j != i {
                        break j;
                    }
                };
                let e_j = f[j] + bias - y[j];
                let (ai_old, aj_old) = (alphas[i], alphas[j]);

                let (lo, hi) = if y[i] != y[j] {
                    ((aj_old - ai_old).max(0.0), (c + aj_old - ai_old).min(c))
                } else {
                    ((ai_old + aj_old - c).max(0.0), (ai_old + aj_old).min(c))
                };
                if (hi - lo).abs() < 1e-10 {
                    continue;
                }

                let k_ij = kernel.entry(i, j);
                let eta = 2.0 * k_ij - 2.0;
                if eta >= 0.0 {
                    continue;
                }

                let aj = (aj_old - y[j] * (e_i - e_j) / eta).clamp(lo, hi);
                if (aj - aj_old).abs() < 1e-5 {
                    continue;
                }
                let ai = ai_old + y[i] * y[j] * (aj_old - aj);

                let di = y[i] * (ai - ai_old);
                let dj = y[j] * (aj - aj_old);
                let b1 = bias - e_i - di - dj * k_ij;
                let b2 = bias - e_j - di * k_ij - dj;
                bias = if ai > 0.0 && ai < c {
                    b1
                } else if aj > 0.0 && aj < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                alphas[i] = ai;
                alphas[j] = aj;
                let (row_i, row_j) = (kernel.row(i), kernel.row(j));
                for ((fk, ki), kj) in f.iter_mut().zip(row_i.iter()).zip(row_j.iter()) {
                    *fk += di * ki + dj * kj;
                }
                changed += 1;
            }

            iter += 1;
            quiet = if changed == 0 { quiet + 1 } else { 0 };
        }

        (alphas, bias, f)
    }
}

impl Estimator for Svc {
    fn name(&self) -> &'static str {
        "svm"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let classes = class_labels(y)?;
        if classes.len() != 2 {
            return Err(LearningError::InvalidData(format!(
                "the support vector classifier supports binary targets, found {} classes",
                classes.len()
            )));
        }
        let n = x.nrows();
        let gamma = scale_gamma(x);
        let signed: Vec<f64> = y.iter().map(|v| if *v == classes[1] { 1.0 } else { -1.0 }).collect();

        self.gamma = gamma;
        let mut kernel = KernelRows::with_default_budget(x, gamma);
        let (alphas, bias, f) = self.smo(&mut kernel, &signed);

        let support: Vec<usize> = (0..n).filter(|&i| alphas[i] > 1e-8).collect();
        if support.is_empty() {
            return Err(LearningError::TrainingFailed(
                "SMO found no support vectors".to_string(),
            ));
        }

        // Decision values on the training rows, for the probability sigmoid.
        let dec: Vec<f64> = f.iter().map(|fi| fi + bias).collect();
        let positive: Vec<bool> = signed.iter().map(|s| *s > 0.0).collect();

        self.platt = platt_fit(&dec, &positive);
        self.dual_coef = support.iter().map(|&k| alphas[k] * signed[k]).collect();
        self.support_vectors = Some(x.select(Axis(0), &support));
        self.bias = bias;
        self.classes = classes;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let dec = self.decision_function(x)?;
        Ok(dec.mapv(|d| if d > 0.0 { self.classes[1] } else { self.classes[0] }))
    }
}

impl ProbabilisticClassifier for Svc {
    fn classes(&self) -> &[f64] {
        &self.classes
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let dec = self.decision_function(x)?;
        let (a, b) = self.platt;
        let mut out = Array2::<f64>::zeros((dec.len(), 2));
        for (i, d) in dec.iter().enumerate() {
            let p = platt_proba(*d, a, b);
            out[[i, 0]] = 1.0 - p;
            out[[i, 1]] = p;
        }
        Ok(out)
    }
}
