//! Raw and conditioned table representations
//!
//! A [`RawTable`] is whatever polars loaded from disk. A [`ConditionedTable`]
//! is the typed, deduplicated, encoded result of the conditioner: every column
//! holds exactly one kind of value.

use crate::error::Result;
use crate::preprocessing::CategoryEncoding;
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

/// Table as loaded from CSV, before any conditioning
pub type RawTable = DataFrame;

/// Load a CSV file with a header row into a [`RawTable`]
pub fn load_csv(path: impl AsRef<Path>) -> Result<RawTable> {
    let path = path.as_ref().to_path_buf();
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path))?
        .finish()?;
    Ok(df)
}

/// Column contents as read from polars
#[derive(Debug, Clone)]
pub(crate) enum RawColumn {
    /// Natively numeric or boolean, already cast to `f64`
    Native(Vec<Option<f64>>),
    /// Anything else, rendered as strings
    FreeForm(Vec<Option<String>>),
}

/// Split a polars frame into named raw columns
pub(crate) fn raw_columns(df: &RawTable) -> Result<Vec<(String, RawColumn)>> {
    let mut out = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let series = column.as_materialized_series();
        let name = series.name().to_string();
        let dtype = series.dtype();

        let native = matches!(
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
                | DataType::Boolean
        );

        let raw = if native {
            let cast = series.cast(&DataType::Float64)?;
            RawColumn::Native(cast.f64()?.into_iter().collect())
        } else {
            let cast = series.cast(&DataType::String)?;
            RawColumn::FreeForm(
                cast.str()?
                    .into_iter()
                    .map(|v| v.map(|s| s.to_string()))
                    .collect(),
            )
        };
        out.push((name, raw));
    }
    Ok(out)
}

/// How a column got its final type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoercionOutcome {
    /// Loaded as numeric or boolean
    Native,
    /// Free-form column whose values all parsed as numbers
    Numeric,
    /// Free-form column whose values all parsed as dates or timestamps
    Temporal,
    /// Left as text
    Text,
    /// Percent strings parsed to numbers
    Percent,
    /// Text label-encoded into dense ids
    Encoded,
}

/// Typed values of one conditioned column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<u32>>),
    Temporal(Vec<Option<NaiveDateTime>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
            ColumnData::Temporal(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of missing cells
    pub fn null_count(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Categorical(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Temporal(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Text(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Short type label for reports
    pub fn kind_name(&self) -> &'static str {
        match self {
            ColumnData::Numeric(_) => "numeric",
            ColumnData::Categorical(_) => "categorical",
            ColumnData::Temporal(_) => "temporal",
            ColumnData::Text(_) => "text",
        }
    }

    /// Numeric view of a cell, for numeric and categorical-encoded columns
    pub fn numeric_value(&self, row: usize) -> Option<f64> {
        match self {
            ColumnData::Numeric(v) => v.get(row).copied().flatten(),
            ColumnData::Categorical(v) => v.get(row).copied().flatten().map(f64::from),
            _ => None,
        }
    }

    /// Whether the column can feed a model
    pub fn is_model_input(&self) -> bool {
        matches!(self, ColumnData::Numeric(_) | ColumnData::Categorical(_))
    }

    /// Keep only the given rows, in the given order
    pub(crate) fn take(&self, rows: &[usize]) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(rows.iter().map(|&r| v[r]).collect()),
            ColumnData::Categorical(v) => {
                ColumnData::Categorical(rows.iter().map(|&r| v[r]).collect())
            }
            ColumnData::Temporal(v) => ColumnData::Temporal(rows.iter().map(|&r| v[r]).collect()),
            ColumnData::Text(v) => ColumnData::Text(rows.iter().map(|&r| v[r].clone()).collect()),
        }
    }

    /// Append a hashable rendering of one cell to `buf`
    pub(crate) fn write_cell(&self, row: usize, buf: &mut Vec<u8>) {
        match self {
            ColumnData::Numeric(v) => match v[row] {
                Some(x) => {
                    buf.push(1);
                    buf.extend_from_slice(&x.to_bits().to_le_bytes());
                }
                None => buf.push(0),
            },
            ColumnData::Categorical(v) => match v[row] {
                Some(x) => {
                    buf.push(1);
                    buf.extend_from_slice(&x.to_le_bytes());
                }
                None => buf.push(0),
            },
            ColumnData::Temporal(v) => match v[row] {
                Some(x) => {
                    buf.push(1);
                    buf.extend_from_slice(&x.and_utc().timestamp_micros().to_le_bytes());
                }
                None => buf.push(0),
            },
            ColumnData::Text(v) => match &v[row] {
                Some(s) => {
                    buf.push(1);
                    buf.extend_from_slice(&(s.len() as u64).to_le_bytes());
                    buf.extend_from_slice(s.as_bytes());
                }
                None => buf.push(0),
            },
        }
    }
}

/// One named, typed column
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionedColumn {
    pub name: String,
    pub data: ColumnData,
    pub outcome: CoercionOutcome,
}

/// Output of the conditioner
#[derive(Debug, Clone)]
pub struct ConditionedTable {
    columns: Vec<ConditionedColumn>,
    n_rows: usize,
    encoding: CategoryEncoding,
}

impl ConditionedTable {
    pub(crate) fn new(
        columns: Vec<ConditionedColumn>,
        n_rows: usize,
        encoding: CategoryEncoding,
    ) -> Self {
        Self {
            columns,
            n_rows,
            encoding,
        }
    }

    pub fn columns(&self) -> &[ConditionedColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ConditionedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Label encoding built for this table
    pub fn encoding(&self) -> &CategoryEncoding {
        &self.encoding
    }

    /// Content hash used to key cached training runs
    pub fn fingerprint(&self) -> u64 {
        let mut bytes = Vec::with_capacity(self.n_rows * self.columns.len() * 9);
        for column in &self.columns {
            bytes.extend_from_slice(column.name.as_bytes());
            bytes.push(0xff);
            for row in 0..self.n_rows {
                column.data.write_cell(row, &mut bytes);
            }
        }
        xxh3_64(&bytes)
    }
}
