//! Dataset Preparation Library
//!
//! Loading, partitioning and feature encoding for the weather and cluster
//! profiling models, built on Polars.
//!
//! # Overview
//!
//! - **Loading**: [`load_weather_csv`] reads a CSV and orders it by its
//!   `date` column when one parses; [`load_csv`] is a plain read.
//! - **Splitting**: [`train_val_test_split`] produces seeded, disjoint
//!   train/validation/test partitions with targets separated from features.
//! - **Preprocessing**: [`build_preprocessor`] derives a column transformer
//!   from dtypes (standardize numeric, one-hot text) whose fitted form is
//!   bound to a persisted [`FeatureSchema`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use atmo_processing::{SplitConfig, build_preprocessor, load_weather_csv, train_val_test_split};
//!
//! let df = load_weather_csv("data/weather.csv")?;
//! let split = train_val_test_split(&df, &["is_rainy", "temp_c"], &SplitConfig::default())?;
//!
//! let fitted = build_preprocessor(&split.train.features).fit(&split.train.features)?;
//! let x_train = fitted.transform(&split.train.features)?;
//! let x_val = fitted.transform(&split.validation.features)?;
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod preprocessor;
pub mod splitter;
pub mod utils;

pub use config::{ConfigValidationError, SplitConfig, SplitConfigBuilder};
pub use error::{ProcessingError, Result, ResultExt};
pub use loader::{DATE_COLUMN, load_csv, load_weather_csv, sort_by_date};
pub use preprocessor::{
    ColumnKind, ColumnTransformer, FeatureColumn, FeatureSchema, FittedPreprocessor,
    OneHotEncoder, StandardScaler, build_preprocessor, numeric_matrix,
};
pub use splitter::{DatasetSplit, SplitPart, train_test_split, train_val_test_split};

// Re-export polars for convenience
pub use polars;
