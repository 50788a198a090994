//! Categorical label encoding

use crate::error::{AutomlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Per-column sorted label lists. A label's id is its index in the list.
///
/// Built fresh on every conditioning run and persisted with the trained
/// artifact so inference-time labels map to the same ids as training did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoding {
    columns: BTreeMap<String, Vec<String>>,
}

impl CategoryEncoding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted labels for a column
    pub fn labels(&self, column: &str) -> Option<&[String]> {
        self.columns.get(column).map(|v| v.as_slice())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Id of `label` in `column`
    pub fn encode(&self, column: &str, label: &str) -> Result<u32> {
        let labels = self
            .columns
            .get(column)
            .ok_or_else(|| AutomlError::FeatureNotFound(column.to_string()))?;
        labels
            .binary_search_by(|l| l.as_str().cmp(label))
            .map(|idx| idx as u32)
            .map_err(|_| AutomlError::UnknownCategory {
                column: column.to_string(),
                value: label.to_string(),
            })
    }

    /// Label for an id
    pub fn decode(&self, column: &str, id: u32) -> Option<&str> {
        self.columns
            .get(column)
            .and_then(|labels| labels.get(id as usize))
            .map(|s| s.as_str())
    }

    /// Encoding restricted to the given columns (those not encoded are skipped)
    pub fn restrict(&self, columns: &[String]) -> CategoryEncoding {
        let columns = columns
            .iter()
            .filter_map(|c| self.columns.get(c).map(|l| (c.clone(), l.clone())))
            .collect();
        CategoryEncoding { columns }
    }

    pub(crate) fn insert(&mut self, column: impl Into<String>, labels: Vec<String>) {
        self.columns.insert(column.into(), labels);
    }
}

/// Dense label encoder, sorted label order
pub struct CategoryEncoder;

impl CategoryEncoder {
    /// Encode one text column, registering its labels in `encoding`.
    /// Missing labels stay missing.
    pub fn fit_transform(
        column: &str,
        values: &[Option<String>],
        encoding: &mut CategoryEncoding,
    ) -> Vec<Option<u32>> {
        let labels: Vec<String> = values
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let index: BTreeMap<&str, u32> = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i as u32))
            .collect();

        let encoded = values
            .iter()
            .map(|v| v.as_deref().and_then(|s| index.get(s).copied()))
            .collect();

        encoding.insert(column, labels);
        encoded
    }
}
