//! IQR outlier detection
//!
//! Each numeric column gets its own fences `Q1 - k*IQR` and `Q3 + k*IQR`
//! (quantiles by linear interpolation over the finite values). The rating
//! column is exempt, and encoded, temporal and text columns are never masked.
//!
//! Missing, NaN and infinite cells are never flagged; projection treats them
//! all as missing and fills them.

use super::table::{ColumnData, ConditionedTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Fitted fences for a column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    pub fn contains(&self, v: f64) -> bool {
        v >= self.lower && v <= self.upper
    }
}

/// Per-column outlier flags for a conditioned table
#[derive(Debug, Clone, Default)]
pub struct OutlierMask {
    masks: BTreeMap<String, Vec<bool>>,
    bounds: BTreeMap<String, OutlierBounds>,
}

impl OutlierMask {
    /// Flags for a column, `None` when the column was not masked
    pub fn column(&self, name: &str) -> Option<&[bool]> {
        self.masks.get(name).map(|m| m.as_slice())
    }

    pub fn bounds(&self, name: &str) -> Option<&OutlierBounds> {
        self.bounds.get(name)
    }

    pub fn outlier_count(&self, name: &str) -> usize {
        self.masks
            .get(name)
            .map(|m| m.iter().filter(|&&b| b).count())
            .unwrap_or(0)
    }

    /// Whether `row` is an outlier in any of `columns`
    pub fn row_flagged(&self, columns: &[&str], row: usize) -> bool {
        columns
            .iter()
            .filter_map(|c| self.masks.get(*c))
            .any(|m| m.get(row).copied().unwrap_or(false))
    }
}

/// IQR-rule outlier detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierDetector {
    factor: f64,
    exempt: Option<String>,
}

impl Default for OutlierDetector {
    fn default() -> Self {
        Self::iqr(1.5)
    }
}

impl OutlierDetector {
    /// Create with IQR factor
    pub fn iqr(factor: f64) -> Self {
        Self {
            factor,
            exempt: None,
        }
    }

    /// Exempt a column (the rating column) from masking
    pub fn with_exempt_column(mut self, column: Option<String>) -> Self {
        self.exempt = column;
        self
    }

    /// Compute the mask for every eligible column of `table`
    pub fn fit(&self, table: &ConditionedTable) -> OutlierMask {
        let mut mask = OutlierMask::default();

        for column in table.columns() {
            if self.exempt.as_deref() == Some(column.name.as_str()) {
                debug!(column = %column.name, "rating column exempt from outlier mask");
                continue;
            }
            let ColumnData::Numeric(values) = &column.data else {
                continue;
            };

            let Some(bounds) = self.compute_bounds(values) else {
                continue;
            };
            let flags: Vec<bool> = values
                .iter()
                .map(|v| v.is_some_and(|x| x.is_finite() && !bounds.contains(x)))
                .collect();

            debug!(
                column = %column.name,
                lower = bounds.lower,
                upper = bounds.upper,
                outliers = flags.iter().filter(|&&b| b).count(),
                "outlier fences"
            );
            mask.masks.insert(column.name.clone(), flags);
            mask.bounds.insert(column.name.clone(), bounds);
        }

        mask
    }

    fn compute_bounds(&self, values: &[Option<f64>]) -> Option<OutlierBounds> {
        let mut sorted: Vec<f64> = values.iter().flatten().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let q1 = quantile(&sorted, 0.25);
        let q3 = quantile(&sorted, 0.75);
        let iqr = q3 - q1;
        Some(OutlierBounds {
            lower: q1 - self.factor * iqr,
            upper: q3 + self.factor * iqr,
        })
    }
}

/// Linear-interpolation quantile of sorted, non-empty data
pub(crate) fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::table::{CoercionOutcome, ConditionedColumn};
    use crate::preprocessing::CategoryEncoding;

    fn numeric(name: &str, values: Vec<Option<f64>>) -> ConditionedColumn {
        ConditionedColumn {
            name: name.to_string(),
            data: ColumnData::Numeric(values),
            outcome: CoercionOutcome::Native,
        }
    }

    fn table(columns: Vec<ConditionedColumn>) -> ConditionedTable {
        let n = columns[0].data.len();
        ConditionedTable::new(columns, n, CategoryEncoding::default())
    }

    #[test]
    fn test_quantile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile(&sorted, 0.25) - 1.75).abs() < 1e-12);
        assert!((quantile(&sorted, 0.75) - 3.25).abs() < 1e-12);
        assert_eq!(quantile(&[5.0], 0.5), 5.0);
    }

    #[test]
    fn test_iqr_detection() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 100.0, 7.0, 8.0, 9.0, -50.0];
        let t = table(vec![numeric("x", values.into_iter().map(Some).collect())]);

        let mask = OutlierDetector::default().fit(&t);
        let flags = mask.column("x").unwrap();
        assert!(flags[5]);
        assert!(flags[9]);
        assert_eq!(mask.outlier_count("x"), 2);
        assert!(mask.row_flagged(&["x"], 5));
        assert!(!mask.row_flagged(&["x"], 0));
    }

    #[test]
    fn test_missing_values_never_outliers() {
        let t = table(vec![numeric("x", vec![Some(1.0), None, Some(1.0), Some(1.0)])]);
        let mask = OutlierDetector::default().fit(&t);
        assert_eq!(mask.column("x").unwrap(), &[false, false, false, false]);
    }

    #[test]
    fn test_non_finite_values_skipped() {
        let mut values: Vec<Option<f64>> = (1..=8).map(|v| Some(v as f64)).collect();
        values.push(Some(f64::INFINITY));
        values.push(Some(f64::NAN));
        values.push(Some(f64::NEG_INFINITY));
        let t = table(vec![numeric("x", values)]);

        let mask = OutlierDetector::default().fit(&t);
        let bounds = mask.bounds("x").unwrap();
        // fences come from 1..=8 alone: Q1 = 2.75, Q3 = 6.25
        assert!((bounds.lower - (2.75 - 1.5 * 3.5)).abs() < 1e-12);
        assert!((bounds.upper - (6.25 + 1.5 * 3.5)).abs() < 1e-12);
        assert_eq!(mask.outlier_count("x"), 0);
    }

    #[test]
    fn test_rating_column_exemption() {
        // 90% constant: IQR collapses to zero and the odd value falls outside
        let mut values = vec![Some(0.0); 9];
        values.push(Some(4.5));

        let t = table(vec![
            numeric("rate", values.clone()),
            numeric("other", values),
        ]);
        let mask = OutlierDetector::default()
            .with_exempt_column(Some("rate".to_string()))
            .fit(&t);

        assert!(mask.column("rate").is_none());
        assert_eq!(mask.outlier_count("other"), 1);
        assert!(!mask.row_flagged(&["rate"], 9));
        assert!(mask.row_flagged(&["rate", "other"], 9));
    }

    #[test]
    fn test_categorical_columns_not_masked() {
        let t = table(vec![ConditionedColumn {
            name: "type".to_string(),
            data: ColumnData::Categorical(vec![Some(0), Some(0), Some(0), Some(9)]),
            outcome: CoercionOutcome::Encoded,
        }]);
        let mask = OutlierDetector::default().fit(&t);
        assert!(mask.column("type").is_none());
    }
}
