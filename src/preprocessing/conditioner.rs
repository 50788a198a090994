//! Raw table conditioning
//!
//! Turns a loaded [`RawTable`] into a [`ConditionedTable`]:
//!
//! 1. drop index-artifact columns (`"Unnamed: 0"`, blank header)
//! 2. drop configured irrelevant columns (`url`)
//! 3. best-effort typing of free-form columns: numeric, else temporal, else text
//! 4. strict percent parsing of configured columns (`sale`)
//! 5. exact-duplicate row removal, first occurrence kept
//! 6. dense label encoding of categorical columns

use super::config::ConditioningConfig;
use super::encoder::{CategoryEncoder, CategoryEncoding};
use super::table::{
    raw_columns, CoercionOutcome, ColumnData, ConditionedColumn, ConditionedTable, RawColumn,
    RawTable,
};
use crate::error::{AutomlError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use tracing::{debug, info};

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

/// Cleans and types a raw table
#[derive(Debug, Clone, Default)]
pub struct DataConditioner {
    config: ConditioningConfig,
}

impl DataConditioner {
    pub fn new(config: ConditioningConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConditioningConfig {
        &self.config
    }

    /// Run every conditioning step over `raw`
    pub fn condition(&self, raw: &RawTable) -> Result<ConditionedTable> {
        let n_raw_rows = raw.height();
        let mut columns = Vec::new();

        for (name, raw_column) in raw_columns(raw)? {
            if self.config.is_index_column(&name) {
                debug!(column = %name, "dropping index column");
                continue;
            }
            if self.config.is_dropped(&name) {
                debug!(column = %name, "dropping irrelevant column");
                continue;
            }

            let (data, outcome) = match raw_column {
                RawColumn::Native(values) => (ColumnData::Numeric(values), CoercionOutcome::Native),
                RawColumn::FreeForm(values) if self.config.is_percent(&name) => (
                    ColumnData::Numeric(parse_percent(&name, &values)?),
                    CoercionOutcome::Percent,
                ),
                RawColumn::FreeForm(values) => coerce_column(values),
            };
            debug!(column = %name, kind = data.kind_name(), ?outcome, "typed column");

            columns.push(ConditionedColumn {
                name,
                data,
                outcome,
            });
        }

        let kept_rows = dedup_rows(&columns, n_raw_rows);
        let n_rows = kept_rows.len();
        if n_rows != n_raw_rows {
            for column in &mut columns {
                column.data = column.data.take(&kept_rows);
            }
        }

        let encoding = self.encode_categoricals(&mut columns);

        info!(
            rows = n_rows,
            duplicates = n_raw_rows - n_rows,
            columns = columns.len(),
            encoded = encoding.len(),
            "conditioned table"
        );

        Ok(ConditionedTable::new(columns, n_rows, encoding))
    }

    fn encode_categoricals(&self, columns: &mut [ConditionedColumn]) -> CategoryEncoding {
        let mut encoding = CategoryEncoding::new();

        for column in columns.iter_mut() {
            let selected = match &self.config.categorical_columns {
                Some(names) => names.iter().any(|n| n == &column.name),
                None => true,
            };
            if !selected {
                continue;
            }

            if let ColumnData::Text(values) = &column.data {
                let ids = CategoryEncoder::fit_transform(&column.name, values, &mut encoding);
                column.data = ColumnData::Categorical(ids);
                column.outcome = CoercionOutcome::Encoded;
                debug!(column = %column.name, "label-encoded column");
            } else if self.config.categorical_columns.is_some() {
                debug!(
                    column = %column.name,
                    kind = column.data.kind_name(),
                    "configured categorical column is not text, left as is"
                );
            }
        }

        encoding
    }
}

/// Best-effort typing of a free-form column. Never fails.
///
/// Blank cells count as missing. The column is numeric when every remaining
/// value parses as a number, temporal when every one parses as a date or
/// timestamp, and text otherwise.
pub fn coerce_column(values: Vec<Option<String>>) -> (ColumnData, CoercionOutcome) {
    let values: Vec<Option<String>> = values
        .into_iter()
        .map(|v| v.filter(|s| !s.trim().is_empty()))
        .collect();

    let numeric: Option<Vec<Option<f64>>> = values
        .iter()
        .map(|v| match v {
            Some(s) => s.trim().parse::<f64>().ok().map(Some),
            None => Some(None),
        })
        .collect();
    if let Some(parsed) = numeric {
        return (ColumnData::Numeric(parsed), CoercionOutcome::Numeric);
    }

    let temporal: Option<Vec<Option<NaiveDateTime>>> = values
        .iter()
        .map(|v| match v {
            Some(s) => parse_temporal(s.trim()).map(Some),
            None => Some(None),
        })
        .collect();
    if let Some(parsed) = temporal {
        return (ColumnData::Temporal(parsed), CoercionOutcome::Temporal);
    }

    (ColumnData::Text(values), CoercionOutcome::Text)
}

/// Parse percent strings (`"20%"`, `"20"`) into numbers.
///
/// Blank cells stay missing; anything else that is not a number fails.
pub fn parse_percent(column: &str, values: &[Option<String>]) -> Result<Vec<Option<f64>>> {
    values
        .iter()
        .map(|v| {
            let Some(raw) = v else {
                return Ok(None);
            };
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let digits = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
            digits
                .parse::<f64>()
                .map(Some)
                .map_err(|_| AutomlError::ParseError {
                    column: column.to_string(),
                    value: raw.clone(),
                })
        })
        .collect()
}

fn parse_temporal(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Indices of the first occurrence of every distinct row, in order
fn dedup_rows(columns: &[ConditionedColumn], n_rows: usize) -> Vec<usize> {
    let mut seen: HashSet<Vec<u8>> = HashSet::with_capacity(n_rows);
    let mut kept = Vec::with_capacity(n_rows);
    for row in 0..n_rows {
        let mut key = Vec::new();
        for column in columns {
            column.data.write_cell(row, &mut key);
        }
        if seen.insert(key) {
            kept.push(row);
        }
    }
    kept
}
