//! Standardization of numeric features.

use crate::error::{ProcessingError, Result};
use crate::utils::{series, series_to_f64};
use ndarray::{Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Z-score scaler: `(x - mean) / std` per column, using the population std.
///
/// Columns with zero variance get a scale of 1, so they map to 0 rather than
/// NaN. Column names are kept so a persisted scaler can be checked against the
/// frame it is later applied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit on a matrix whose columns are named by `columns`.
    pub fn fit(columns: &[String], data: &Array2<f64>) -> Result<Self> {
        if data.ncols() != columns.len() {
            return Err(ProcessingError::InvalidData(format!(
                "scaler given {} column names for a matrix with {} columns",
                columns.len(),
                data.ncols()
            )));
        }
        if data.nrows() == 0 && !columns.is_empty() {
            return Err(ProcessingError::NoValidValues(columns.join(", ")));
        }

        let mut means = Vec::with_capacity(columns.len());
        let mut scales = Vec::with_capacity(columns.len());
        for col in data.axis_iter(Axis(1)) {
            let n = col.len() as f64;
            let mean = col.sum() / n;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            means.push(mean);
            scales.push(if std > f64::EPSILON && std.is_finite() {
                std
            } else {
                1.0
            });
        }

        Ok(Self {
            columns: columns.to_vec(),
            means,
            scales,
        })
    }

    /// Fit on the named numeric columns of a frame.
    pub fn fit_frame(df: &DataFrame, columns: &[String]) -> Result<Self> {
        Self::fit(columns, &numeric_matrix(df, columns)?)
    }

    /// Scale a matrix with the same column layout as the fitted one.
    pub fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        if data.ncols() != self.columns.len() {
            return Err(ProcessingError::FeatureSchemaMismatch {
                column: format!("<{} columns>", data.ncols()),
                reason: format!("scaler was fitted on {} columns", self.columns.len()),
            });
        }

        let mut out = data.clone();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (mean, scale) = (self.means[j], self.scales[j]);
            col.mapv_inplace(|v| (v - mean) / scale);
        }
        Ok(out)
    }

    /// Select the fitted columns from a frame by name and scale them.
    pub fn transform_frame(&self, df: &DataFrame) -> Result<Array2<f64>> {
        self.transform(&numeric_matrix(df, &self.columns)?)
    }

    /// Names of the fitted columns, in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }
}

/// Build a row-major `f64` matrix from the named columns of a frame.
pub fn numeric_matrix(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let mut data = Array2::<f64>::zeros((df.height(), columns.len()));
    for (j, name) in columns.iter().enumerate() {
        let values = series_to_f64(series(df, name)?)?;
        for (i, v) in values.into_iter().enumerate() {
            data[[i, j]] = v;
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_fit_uses_population_std() {
        let data = array![[1.0, 10.0], [3.0, 10.0]];
        let scaler = StandardScaler::fit(&names(&["a", "b"]), &data).unwrap();
        assert_eq!(scaler.means(), &[2.0, 10.0]);
        assert_eq!(scaler.scales(), &[1.0, 1.0]);

        let out = scaler.transform(&data).unwrap();
        assert_eq!(out, array![[-1.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let data = array![[5.0], [5.0], [5.0]];
        let scaler = StandardScaler::fit(&names(&["c"]), &data).unwrap();
        let out = scaler.transform(&array![[5.0], [7.0]]).unwrap();
        assert_eq!(out, array![[0.0], [2.0]]);
    }

    #[test]
    fn test_transform_rejects_wrong_width() {
        let scaler = StandardScaler::fit(&names(&["a"]), &array![[1.0], [2.0]]).unwrap();
        let err = scaler.transform(&array![[1.0, 2.0]]).unwrap_err();
        assert!(err.is_schema_mismatch());
    }

    #[test]
    fn test_frame_round_trip_selects_by_name() {
        let df = df!("nodes" => &[1i64, 2, 4, 8], "ppn" => &[4.0, 8.0, 16.0, 4.0]).unwrap();
        let scaler = StandardScaler::fit_frame(&df, &names(&["ppn", "nodes"])).unwrap();
        assert_eq!(scaler.columns(), &["ppn".to_string(), "nodes".to_string()]);

        let scaled = scaler.transform_frame(&df).unwrap();
        let col_mean: f64 = scaled.column(1).sum() / 4.0;
        assert!(col_mean.abs() < 1e-12);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let df = df!("nodes" => &[1i64, 2]).unwrap();
        let err = StandardScaler::fit_frame(&df, &names(&["ppn"])).unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }
}
