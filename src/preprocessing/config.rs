//! Conditioning configuration

use serde::{Deserialize, Serialize};

/// Configuration for turning a raw table into a conditioned one
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditioningConfig {
    /// Index artifacts left behind by spreadsheet exports
    pub index_columns: Vec<String>,

    /// Columns with no predictive value, dropped when present
    pub drop_columns: Vec<String>,

    /// Columns holding percent strings such as `"20%"`
    pub percent_columns: Vec<String>,

    /// Columns to label-encode. `None` encodes every remaining text column.
    pub categorical_columns: Option<Vec<String>>,

    /// Column exempt from outlier masking
    pub rating_column: Option<String>,

    /// IQR multiplier for the outlier fences
    pub iqr_factor: f64,

    /// Value substituted for missing cells in the projected matrix
    pub fill_value: f64,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            index_columns: vec!["Unnamed: 0".to_string(), String::new()],
            drop_columns: vec!["url".to_string()],
            percent_columns: vec!["sale".to_string()],
            categorical_columns: None,
            rating_column: Some("rate".to_string()),
            iqr_factor: 1.5,
            fill_value: 0.0,
        }
    }
}

impl ConditioningConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the dropped columns
    pub fn with_drop_columns(mut self, columns: Vec<String>) -> Self {
        self.drop_columns = columns;
        self
    }

    /// Builder method to set the percent columns
    pub fn with_percent_columns(mut self, columns: Vec<String>) -> Self {
        self.percent_columns = columns;
        self
    }

    /// Builder method to restrict categorical encoding to the given columns
    pub fn with_categorical_columns(mut self, columns: Vec<String>) -> Self {
        self.categorical_columns = Some(columns);
        self
    }

    /// Builder method to set (or clear) the outlier-exempt rating column
    pub fn with_rating_column(mut self, column: Option<String>) -> Self {
        self.rating_column = column;
        self
    }

    pub fn with_iqr_factor(mut self, factor: f64) -> Self {
        self.iqr_factor = factor;
        self
    }

    pub fn with_fill_value(mut self, value: f64) -> Self {
        self.fill_value = value;
        self
    }

    pub(crate) fn is_index_column(&self, name: &str) -> bool {
        self.index_columns.iter().any(|c| c == name)
    }

    pub(crate) fn is_dropped(&self, name: &str) -> bool {
        self.drop_columns.iter().any(|c| c == name)
    }

    pub(crate) fn is_percent(&self, name: &str) -> bool {
        self.percent_columns.iter().any(|c| c == name)
    }
}
