//! Shared utilities for dataset processing.
//!
//! Dtype classification and Series extraction helpers used by the loader,
//! splitter and preprocessor.

use crate::error::{ProcessingError, Result};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for preprocessing purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Date or datetime types
    Datetime,
    /// Boolean type
    Boolean,
    /// String/text type
    String,
    /// Other/unknown types
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Datetime(_, _) | DataType::Date | DataType::Time
    )
}

/// Check if a DataType is boolean.
#[inline]
pub fn is_boolean_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Boolean)
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if is_datetime_dtype(dtype) {
        DtypeCategory::Datetime
    } else if is_boolean_dtype(dtype) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// Frame / Series Extraction
// =============================================================================

/// Column names of a frame, in order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect()
}

/// Check whether a frame has a column with the given name.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_columns().iter().any(|c| c.name().as_str() == name)
}

/// Fetch a column as a materialized Series.
pub fn series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| ProcessingError::ColumnNotFound(name.to_string()))
}

/// Gather rows by position into a new frame, preserving the given order.
pub fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = rows.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}

/// Convert a numeric or boolean Series to `f64` values.
///
/// Nulls are rejected: estimators downstream have no missing-value handling.
pub fn series_to_f64(series: &Series) -> Result<Vec<f64>> {
    let name = series.name().to_string();
    if series.null_count() > 0 {
        return Err(ProcessingError::InvalidData(format!(
            "column '{}' contains {} null value(s)",
            name,
            series.null_count()
        )));
    }

    let casted = series.cast(&DataType::Float64)?;
    let values: Vec<f64> = casted.f64()?.into_iter().flatten().collect();
    if values.len() != series.len() {
        return Err(ProcessingError::NoValidValues(name));
    }
    Ok(values)
}

/// Convert a Series to optional strings (nulls preserved as `None`).
pub fn series_to_strings(series: &Series) -> Result<Vec<Option<String>>> {
    let casted = series.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_is_datetime_dtype() {
        assert!(is_datetime_dtype(&DataType::Date));
        assert!(is_datetime_dtype(&DataType::Datetime(
            TimeUnit::Milliseconds,
            None
        )));
        assert!(!is_datetime_dtype(&DataType::String));
    }

    #[test]
    fn test_dtype_category() {
        assert_eq!(get_dtype_category(&DataType::Int64), DtypeCategory::Numeric);
        assert_eq!(
            get_dtype_category(&DataType::Float64),
            DtypeCategory::Numeric
        );
        assert_eq!(get_dtype_category(&DataType::Date), DtypeCategory::Datetime);
        assert_eq!(
            get_dtype_category(&DataType::Boolean),
            DtypeCategory::Boolean
        );
        assert_eq!(get_dtype_category(&DataType::String), DtypeCategory::String);
    }

    #[test]
    fn test_series_to_f64_casts_integers() {
        let s = Series::new("nodes".into(), &[1i64, 2, 4]);
        assert_eq!(series_to_f64(&s).unwrap(), vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_series_to_f64_rejects_nulls() {
        let s = Series::new("rain_mm".into(), &[Some(1.0), None]);
        let err = series_to_f64(&s).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DATA");
    }

    #[test]
    fn test_series_to_strings_keeps_nulls() {
        let s = Series::new("city".into(), &[Some("Oslo"), None]);
        assert_eq!(
            series_to_strings(&s).unwrap(),
            vec![Some("Oslo".to_string()), None]
        );
    }

    #[test]
    fn test_has_column() {
        let df = df!("a" => &[1, 2], "b" => &["x", "y"]).unwrap();
        assert!(has_column(&df, "a"));
        assert!(!has_column(&df, "c"));
        assert_eq!(column_names(&df), vec!["a", "b"]);
    }
}
