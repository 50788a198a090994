//! Feature / target projection and the seeded train/test split

use super::outlier::OutlierMask;
use super::table::ConditionedTable;
use crate::error::{AutomlError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Named numeric feature matrix
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub data: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(names: Vec<String>, data: Array2<f64>) -> Result<Self> {
        if names.len() != data.ncols() {
            return Err(AutomlError::ShapeError {
                expected: format!("{} columns", names.len()),
                actual: format!("{} columns", data.ncols()),
            });
        }
        Ok(Self { names, data })
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    fn select_rows(&self, rows: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            names: self.names.clone(),
            data: self.data.select(Axis(0), rows),
        }
    }
}

/// Train/test partition of a [`Dataset`]
#[derive(Debug, Clone)]
pub struct SplitData {
    pub x_train: FeatureMatrix,
    pub x_test: FeatureMatrix,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

/// Projected predictors and target
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: FeatureMatrix,
    pub target: Array1<f64>,
    pub target_name: String,
}

impl Dataset {
    /// Project `predictors` and `target` out of `table`.
    ///
    /// Rows flagged as outliers in any selected column are dropped; the
    /// remaining missing and non-finite cells become `fill_value`.
    pub fn project(
        table: &ConditionedTable,
        mask: &OutlierMask,
        predictors: &[String],
        target: &str,
        fill_value: f64,
    ) -> Result<Self> {
        let mut selected: Vec<&str> = predictors.iter().map(|s| s.as_str()).collect();
        selected.push(target);

        let mut columns = Vec::with_capacity(selected.len());
        for name in &selected {
            let column = table
                .column(name)
                .ok_or_else(|| AutomlError::FeatureNotFound(name.to_string()))?;
            if !column.data.is_model_input() {
                return Err(AutomlError::DataError(format!(
                    "column '{}' is {} and cannot be used as a model input",
                    name,
                    column.data.kind_name()
                )));
            }
            columns.push(&column.data);
        }

        let rows: Vec<usize> = (0..table.n_rows())
            .filter(|&r| !mask.row_flagged(&selected, r))
            .collect();
        if rows.is_empty() {
            return Err(AutomlError::DataError(
                "no rows left after outlier removal".to_string(),
            ));
        }
        debug!(
            kept = rows.len(),
            dropped = table.n_rows() - rows.len(),
            "projected dataset"
        );

        let n_features = predictors.len();
        let mut x = Array2::zeros((rows.len(), n_features));
        let mut y = Array1::zeros(rows.len());
        for (i, &r) in rows.iter().enumerate() {
            for (j, data) in columns[..n_features].iter().enumerate() {
                x[[i, j]] = finite_or(data.numeric_value(r), fill_value);
            }
            y[i] = finite_or(columns[n_features].numeric_value(r), fill_value);
        }

        Ok(Self {
            features: FeatureMatrix::new(predictors.to_vec(), x)?,
            target: y,
            target_name: target.to_string(),
        })
    }

    pub fn n_rows(&self) -> usize {
        self.target.len()
    }

    /// Shuffle with a seeded ChaCha stream and hold out `ceil(test_size * n)` rows
    pub fn train_test_split(&self, test_size: f64, seed: u64) -> Result<SplitData> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(AutomlError::InvalidParameter {
                name: "test_size".to_string(),
                value: test_size.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }

        let n = self.n_rows();
        let n_test = (test_size * n as f64).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(AutomlError::DataError(format!(
                "cannot split {} rows with test size {}: both sides need at least one row",
                n, test_size
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let (test_idx, train_idx) = indices.split_at(n_test);
        Ok(SplitData {
            x_train: self.features.select_rows(train_idx),
            x_test: self.features.select_rows(test_idx),
            y_train: self.target.select(Axis(0), train_idx),
            y_test: self.target.select(Axis(0), test_idx),
        })
    }
}

fn finite_or(value: Option<f64>, fill_value: f64) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(fill_value)
}
