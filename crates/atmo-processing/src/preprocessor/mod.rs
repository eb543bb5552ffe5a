//! Column-type driven feature preprocessing.
//!
//! [`build_preprocessor`] inspects the dtypes of a feature frame and produces
//! an unfitted [`ColumnTransformer`]:
//!
//! - numeric and boolean columns are standardized ([`StandardScaler`]);
//! - string and categorical columns are one-hot encoded ([`OneHotEncoder`]);
//! - any other column (dates, lists, ...) is dropped.
//!
//! Fitting yields a [`FittedPreprocessor`] that carries the [`FeatureSchema`]
//! it was fitted on. `transform` checks incoming frames against that schema
//! before producing a matrix, so a model is never fed columns in an order or
//! encoding it was not trained with.
//!
//! # Example
//!
//! ```rust
//! use atmo_processing::preprocessor::build_preprocessor;
//! use polars::prelude::*;
//!
//! let train = df!(
//!     "humidity" => &[60.0, 80.0],
//!     "sky" => &["clear", "rain"]
//! ).unwrap();
//!
//! let fitted = build_preprocessor(&train).fit(&train).unwrap();
//! let x = fitted.transform(&train).unwrap();
//! assert_eq!(x.dim(), (2, 3));
//! ```

pub mod encoder;
pub mod scaler;

pub use encoder::OneHotEncoder;
pub use scaler::{StandardScaler, numeric_matrix};

use crate::error::{ProcessingError, Result};
use crate::utils::{DtypeCategory, get_dtype_category, has_column, series, series_to_strings};
use ndarray::{Array2, s};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a feature column is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl ColumnKind {
    /// Kind for a dtype, or `None` when the column is not encodable.
    pub fn from_dtype(dtype: &DataType) -> Option<Self> {
        match get_dtype_category(dtype) {
            DtypeCategory::Numeric | DtypeCategory::Boolean => Some(ColumnKind::Numeric),
            DtypeCategory::String => Some(ColumnKind::Categorical),
            DtypeCategory::Datetime | DtypeCategory::Other => None,
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnKind::Numeric => write!(f, "numeric"),
            ColumnKind::Categorical => write!(f, "categorical"),
        }
    }
}

/// One entry of a [`FeatureSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub kind: ColumnKind,
}

/// Ordered feature columns with their declared kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<FeatureColumn>,
}

impl FeatureSchema {
    /// Infer a schema from a frame's dtypes, skipping unencodable columns.
    pub fn infer(df: &DataFrame) -> Self {
        let columns = df
            .get_columns()
            .iter()
            .filter_map(|c| {
                ColumnKind::from_dtype(c.dtype()).map(|kind| FeatureColumn {
                    name: c.name().to_string(),
                    kind,
                })
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Names of all columns, in schema order.
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Names of the columns of one kind, in schema order.
    pub fn names_of(&self, kind: ColumnKind) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Declared kind of a column.
    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.kind)
    }

    /// Verify that `df` provides every schema column with a matching kind.
    ///
    /// Extra columns in `df` are allowed.
    pub fn check(&self, df: &DataFrame) -> Result<()> {
        for col in &self.columns {
            if !has_column(df, &col.name) {
                return Err(ProcessingError::FeatureSchemaMismatch {
                    column: col.name.clone(),
                    reason: "column is missing".to_string(),
                });
            }
            let dtype = series(df, &col.name)?.dtype();
            match ColumnKind::from_dtype(dtype) {
                Some(kind) if kind == col.kind => {}
                // An all-null column carries no kind information.
                None if *dtype == DataType::Null => {}
                other => {
                    let found = other.map_or_else(|| format!("{dtype:?}"), |k| k.to_string());
                    return Err(ProcessingError::FeatureSchemaMismatch {
                        column: col.name.clone(),
                        reason: format!("expected {} column, found {}", col.kind, found),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Unfitted composite transformer: a schema waiting for data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransformer {
    schema: FeatureSchema,
    dropped: Vec<String>,
}

/// Build an unfitted transformer for the columns of `features`.
pub fn build_preprocessor(features: &DataFrame) -> ColumnTransformer {
    let schema = FeatureSchema::infer(features);
    let dropped: Vec<String> = features
        .get_columns()
        .iter()
        .map(|c| c.name().to_string())
        .filter(|name| schema.kind_of(name).is_none())
        .collect();

    debug!(
        "Preprocessor: {} numeric, {} categorical, dropped {:?}",
        schema.names_of(ColumnKind::Numeric).len(),
        schema.names_of(ColumnKind::Categorical).len(),
        dropped
    );

    ColumnTransformer { schema, dropped }
}

impl ColumnTransformer {
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Columns that had no encodable dtype.
    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped
    }

    /// Learn scaling statistics and categories from `df`.
    pub fn fit(&self, df: &DataFrame) -> Result<FittedPreprocessor> {
        self.schema.check(df)?;

        let numeric = self.schema.names_of(ColumnKind::Numeric);
        let scaler = StandardScaler::fit_frame(df, &numeric)?;

        let encoders = self
            .schema
            .names_of(ColumnKind::Categorical)
            .into_iter()
            .map(|name| {
                let values = series_to_strings(series(df, &name)?)?;
                Ok(OneHotEncoder::fit(name, &values))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FittedPreprocessor {
            schema: self.schema.clone(),
            scaler,
            encoders,
        })
    }
}

/// Fitted preprocessing state bound to its feature schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    schema: FeatureSchema,
    scaler: StandardScaler,
    encoders: Vec<OneHotEncoder>,
}

impl FittedPreprocessor {
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn encoders(&self) -> &[OneHotEncoder] {
        &self.encoders
    }

    /// Width of the matrix produced by [`Self::transform`].
    pub fn n_output_features(&self) -> usize {
        self.scaler.columns().len() + self.encoders.iter().map(|e| e.width()).sum::<usize>()
    }

    /// Encode `df` as a matrix: scaled numeric block, then one-hot blocks.
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        self.schema.check(df)?;

        let n_rows = df.height();
        let n_numeric = self.scaler.columns().len();
        let mut out = Array2::<f64>::zeros((n_rows, self.n_output_features()));

        let scaled = self.scaler.transform_frame(df)?;
        out.slice_mut(s![.., ..n_numeric]).assign(&scaled);

        let mut offset = n_numeric;
        for encoder in &self.encoders {
            let values = series_to_strings(series(df, encoder.column())?)?;
            let width = encoder.width();
            let mut block = vec![0.0; width];
            for (i, value) in values.iter().enumerate() {
                encoder.encode_into(value.as_deref(), &mut block);
                for (j, v) in block.iter().enumerate() {
                    out[[i, offset + j]] = *v;
                }
            }
            offset += width;
        }

        Ok(out)
    }
}
