//! CSV dataset loading.
//!
//! [`load_weather_csv`] reads a weather table and, when a parsable `date`
//! column is present, types it and orders rows by it. Anything else about
//! the file is passed through untouched: there is no schema validation here,
//! and reader errors propagate to the caller.

use crate::error::Result;
use crate::utils::{has_column, series, series_to_strings, take_rows};
use chrono::{NaiveDate, NaiveDateTime};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Name of the optional ordering column in weather datasets.
pub const DATE_COLUMN: &str = "date";

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Load a delimited file with a header row, inferring column types.
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    debug!("Reading CSV from {}", path.display());

    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    Ok(df)
}

/// Load a weather dataset, ordering rows by `date` when it can be parsed.
///
/// If the `date` column is absent, or any of its values fails to parse, the
/// table is returned exactly as read: no date typing and no sort.
pub fn load_weather_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let df = load_csv(path.as_ref())?;

    match sort_by_date(&df, DATE_COLUMN)? {
        Some(sorted) => {
            info!(
                "Loaded {} rows from {} (ordered by '{}')",
                sorted.height(),
                path.as_ref().display(),
                DATE_COLUMN
            );
            Ok(sorted)
        }
        None => {
            info!(
                "Loaded {} rows from {} (no date ordering)",
                df.height(),
                path.as_ref().display()
            );
            Ok(df)
        }
    }
}

/// Parsed values of a date column, kept in whichever resolution matched.
enum ParsedDates {
    Dates(Vec<NaiveDate>),
    DateTimes(Vec<NaiveDateTime>),
}

impl ParsedDates {
    /// Build the typed replacement column and the per-row sort keys.
    fn into_column(self, name: &str) -> Result<(Series, Vec<i64>)> {
        match self {
            ParsedDates::Dates(dates) => {
                let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
                let days: Vec<i32> = dates
                    .iter()
                    .map(|d| (*d - epoch).num_days() as i32)
                    .collect();
                let keys = days.iter().map(|&d| i64::from(d)).collect();
                let series = Series::new(name.into(), days).cast(&DataType::Date)?;
                Ok((series, keys))
            }
            ParsedDates::DateTimes(stamps) => {
                let millis: Vec<i64> = stamps
                    .iter()
                    .map(|t| t.and_utc().timestamp_millis())
                    .collect();
                let series = Series::new(name.into(), millis.clone())
                    .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
                Ok((series, millis))
            }
        }
    }
}

fn parse_dates(values: &[Option<String>]) -> Option<ParsedDates> {
    let as_dates: Option<Vec<NaiveDate>> = values
        .iter()
        .map(|v| {
            v.as_deref()
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        })
        .collect();
    if let Some(dates) = as_dates {
        return Some(ParsedDates::Dates(dates));
    }

    values
        .iter()
        .map(|v| {
            let s = v.as_deref()?.trim();
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        })
        .collect::<Option<Vec<_>>>()
        .map(ParsedDates::DateTimes)
}

/// Sort `df` ascending by `column` after parsing it as a date.
///
/// Returns `Ok(None)` when the column is missing or unparsable. The sort is
/// stable, so rows sharing a timestamp keep their file order.
pub fn sort_by_date(df: &DataFrame, column: &str) -> Result<Option<DataFrame>> {
    if !has_column(df, column) {
        debug!("No '{}' column; skipping date ordering", column);
        return Ok(None);
    }

    let source = series(df, column)?;
    let (typed, keys) = match source.dtype() {
        DataType::Date | DataType::Datetime(_, _) => {
            if source.null_count() > 0 {
                return Ok(None);
            }
            let keys: Vec<i64> = source
                .cast(&DataType::Int64)?
                .i64()?
                .into_iter()
                .flatten()
                .collect();
            (source.clone(), keys)
        }
        DataType::String => {
            let values = series_to_strings(source)?;
            match parse_dates(&values) {
                Some(parsed) => parsed.into_column(column)?,
                None => {
                    debug!("Column '{}' is not parsable as dates", column);
                    return Ok(None);
                }
            }
        }
        other => {
            debug!("Column '{}' has non-date dtype {:?}", column, other);
            return Ok(None);
        }
    };

    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by_key(|&i| keys[i]);

    let mut with_dates = df.clone();
    with_dates.with_column(typed)?;
    Ok(Some(take_rows(&with_dates, &order)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_by_date_orders_rows() {
        let df = df!(
            "date" => &["2024-01-03", "2024-01-01", "2024-01-02"],
            "temp_c" => &[3.0, 1.0, 2.0]
        )
        .unwrap();

        let sorted = sort_by_date(&df, "date").unwrap().unwrap();
        let temps: Vec<f64> = sorted
            .column("temp_c")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(temps, vec![1.0, 2.0, 3.0]);
        assert_eq!(sorted.column("date").unwrap().dtype(), &DataType::Date);
    }

    #[test]
    fn test_sort_by_datetime_values() {
        let df = df!(
            "date" => &["2024-01-01 12:00:00", "2024-01-01 06:00:00"],
            "v" => &[2, 1]
        )
        .unwrap();

        let sorted = sort_by_date(&df, "date").unwrap().unwrap();
        let v: Vec<i32> = sorted
            .column("v")
            .unwrap()
            .i32()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(v, vec![1, 2]);
    }

    #[test]
    fn test_unparsable_dates_are_left_alone() {
        let df = df!("date" => &["yesterday", "2024-01-01"], "v" => &[1, 2]).unwrap();
        assert!(sort_by_date(&df, "date").unwrap().is_none());
    }

    #[test]
    fn test_missing_date_column() {
        let df = df!("v" => &[1, 2]).unwrap();
        assert!(sort_by_date(&df, "date").unwrap().is_none());
    }
}
