//! Validation metrics reported by the trainers.

use crate::error::{LearningError, Result};
use ndarray::Array1;

fn check_pair(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.is_empty() {
        return Err(LearningError::InvalidData(
            "cannot score an empty validation set".to_string(),
        ));
    }
    if y_true.len() != y_pred.len() {
        return Err(LearningError::InvalidData(format!(
            "{} targets but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

/// Fraction of predictions equal to the true label.
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_pair(y_true, y_pred)?;
    let hits = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(hits as f64 / y_true.len() as f64)
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_pair(y_true, y_pred)?;
    Ok((y_true - y_pred).mapv(f64::abs).mean().unwrap_or_default())
}

/// Mean of `|y - ŷ| / max(|y|, ε)`, as a fraction (not a percentage).
pub fn mean_absolute_percentage_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_pair(y_true, y_pred)?;
    let total: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs() / t.abs().max(f64::EPSILON))
        .sum();
    Ok(total / y_true.len() as f64)
}
