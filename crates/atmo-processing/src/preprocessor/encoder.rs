//! One-hot encoding of text columns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One-hot encoder for a single column.
///
/// Categories are the sorted distinct non-null values seen at fit time. A
/// value outside that set, or a null, encodes as an all-zero block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    column: String,
    categories: Vec<String>,
}

impl OneHotEncoder {
    pub fn fit(column: impl Into<String>, values: &[Option<String>]) -> Self {
        let categories: BTreeSet<&str> = values.iter().flatten().map(String::as_str).collect();
        Self {
            column: column.into(),
            categories: categories.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Width of the block this encoder writes per row.
    pub fn width(&self) -> usize {
        self.categories.len()
    }

    /// Position of `value` in the fitted categories, if known.
    pub fn index_of(&self, value: Option<&str>) -> Option<usize> {
        let value = value?;
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }

    /// Write the encoding of `value` into `block` (length [`Self::width`]).
    pub fn encode_into(&self, value: Option<&str>, block: &mut [f64]) {
        block.fill(0.0);
        if let Some(idx) = self.index_of(value) {
            block[idx] = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(v: &[Option<&str>]) -> Vec<Option<String>> {
        v.iter().map(|s| s.map(str::to_string)).collect()
    }

    #[test]
    fn test_categories_are_sorted_and_distinct() {
        let enc = OneHotEncoder::fit("sky", &values(&[Some("rain"), Some("clear"), None, Some("rain")]));
        assert_eq!(enc.categories(), &["clear".to_string(), "rain".to_string()]);
        assert_eq!(enc.width(), 2);
    }

    #[test]
    fn test_known_value_sets_one_slot() {
        let enc = OneHotEncoder::fit("sky", &values(&[Some("clear"), Some("fog"), Some("rain")]));
        let mut block = vec![9.0; 3];
        enc.encode_into(Some("fog"), &mut block);
        assert_eq!(block, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unseen_and_null_are_all_zero() {
        let enc = OneHotEncoder::fit("sky", &values(&[Some("clear"), Some("rain")]));
        let mut block = vec![1.0; 2];
        enc.encode_into(Some("hail"), &mut block);
        assert_eq!(block, vec![0.0, 0.0]);
        enc.encode_into(None, &mut block);
        assert_eq!(block, vec![0.0, 0.0]);
    }
}
