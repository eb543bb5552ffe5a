//! Seeded train/validation/test partitioning.
//!
//! Splits shuffle row positions with a ChaCha8 generator seeded from the
//! configured `random_state`, so identical inputs always produce identical
//! partitions regardless of platform.

use crate::config::SplitConfig;
use crate::error::{ProcessingError, Result};
use crate::utils::{column_names, has_column, take_rows};
use polars::prelude::*;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Guard against `0.2 * 10 = 2.0000000000000004` rounding up to 3.
const CEIL_EPSILON: f64 = 1e-9;

/// Features and targets for one row partition.
#[derive(Debug, Clone)]
pub struct SplitPart {
    pub features: DataFrame,
    /// Present target columns only; a zero-column frame when none are present.
    pub targets: DataFrame,
}

impl SplitPart {
    /// Number of rows in this partition.
    pub fn len(&self) -> usize {
        self.features.height()
    }

    /// Whether this partition has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the named target column exists in this partition.
    pub fn has_target(&self, name: &str) -> bool {
        has_column(&self.targets, name)
    }
}

/// The three disjoint partitions of a dataset.
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train: SplitPart,
    pub validation: SplitPart,
    pub test: SplitPart,
    /// Target columns that were found in the source frame, in request order.
    pub target_columns: Vec<String>,
}

impl DatasetSplit {
    /// Names of the feature columns shared by every partition.
    pub fn feature_columns(&self) -> Vec<String> {
        column_names(&self.train.features)
    }
}

/// Number of rows a fraction of `n` rounds up to.
fn ceil_count(fraction: f64, n: usize) -> usize {
    let raw = (fraction * n as f64 - CEIL_EPSILON).ceil();
    (raw.max(0.0) as usize).min(n)
}

/// Shuffle `positions` with a fresh generator and cut off the first `head` of them.
fn shuffle_split(positions: &[usize], head: usize, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut shuffled = positions.to_vec();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);
    let rest = shuffled.split_off(head);
    (shuffled, rest)
}

/// Split row positions `0..n` into `(train, val, test)` index lists.
pub fn split_indices(n: usize, config: &SplitConfig) -> Result<(Vec<usize>, Vec<usize>, Vec<usize>)> {
    config.validate()?;
    if n == 0 {
        return Err(ProcessingError::InvalidData(
            "cannot split an empty dataset".to_string(),
        ));
    }

    let all: Vec<usize> = (0..n).collect();
    let n_test = ceil_count(config.test_size, n);
    let (test, remainder) = shuffle_split(&all, n_test, config.random_state);

    // Train takes the rounded-up share of the remainder; validation gets the rest.
    let m = remainder.len();
    let n_val = m - ceil_count(1.0 - config.relative_val_size(), m);
    let (val, train) = shuffle_split(&remainder, n_val, config.random_state);

    if train.is_empty() {
        return Err(ProcessingError::InvalidData(format!(
            "{} rows leave no training rows with test_size={} and val_size={}",
            n, config.test_size, config.val_size
        )));
    }

    Ok((train, val, test))
}

fn make_part(features: &DataFrame, targets: &DataFrame, rows: &[usize]) -> Result<SplitPart> {
    let targets = if targets.width() == 0 {
        DataFrame::empty()
    } else {
        take_rows(targets, rows)?
    };
    Ok(SplitPart {
        features: take_rows(features, rows)?,
        targets,
    })
}

/// Partition a frame into train, validation and test sets.
///
/// `target_cols` is filtered to the columns actually present; every other
/// column becomes a feature. Validation receives `val_size` of the *whole*
/// dataset, taken from what remains after the test rows are removed.
pub fn train_val_test_split(
    df: &DataFrame,
    target_cols: &[&str],
    config: &SplitConfig,
) -> Result<DatasetSplit> {
    let present: Vec<String> = target_cols
        .iter()
        .filter(|name| has_column(df, name))
        .map(|name| name.to_string())
        .collect();

    let feature_names: Vec<String> = column_names(df)
        .into_iter()
        .filter(|name| !present.contains(name))
        .collect();

    let features = df.select(feature_names)?;
    let targets = if present.is_empty() {
        DataFrame::empty()
    } else {
        df.select(present.clone())?
    };

    let (train, val, test) = split_indices(df.height(), config)?;
    debug!(
        "Split {} rows into train={} val={} test={} (targets: {:?})",
        df.height(),
        train.len(),
        val.len(),
        test.len(),
        present
    );

    Ok(DatasetSplit {
        train: make_part(&features, &targets, &train)?,
        validation: make_part(&features, &targets, &val)?,
        test: make_part(&features, &targets, &test)?,
        target_columns: present,
    })
}

/// Single seeded split into `(train, test)` frames.
pub fn train_test_split(
    df: &DataFrame,
    test_size: f64,
    random_state: u64,
) -> Result<(DataFrame, DataFrame)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ProcessingError::InvalidConfig(format!(
            "test_size must be between 0.0 and 1.0, got {test_size}"
        )));
    }

    let n = df.height();
    let all: Vec<usize> = (0..n).collect();
    let (test, train) = shuffle_split(&all, ceil_count(test_size, n), random_state);
    if train.is_empty() {
        return Err(ProcessingError::InvalidData(format!(
            "{n} rows leave no training rows with test_size={test_size}"
        )));
    }

    Ok((take_rows(df, &train)?, take_rows(df, &test)?))
}
