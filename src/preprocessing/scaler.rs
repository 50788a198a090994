//! Feature standardization
//!
//! A [`ScalerState`] is fitted once on the training split and then reused
//! unchanged for the test split, the full-data retrain and every inference
//! call. Transforming never refits.

use super::dataset::FeatureMatrix;
use crate::error::{AutomlError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Fits a [`ScalerState`]
pub struct StandardScaler;

impl StandardScaler {
    /// Per-feature mean and population standard deviation of `x`.
    /// A zero deviation scales by 1.
    pub fn fit(x: &FeatureMatrix) -> Result<ScalerState> {
        if x.n_rows() == 0 || x.n_features() == 0 {
            return Err(AutomlError::DataError(format!(
                "cannot fit scaler on a {}x{} matrix",
                x.n_rows(),
                x.n_features()
            )));
        }

        let mean = x
            .data
            .mean_axis(Axis(0))
            .ok_or_else(|| AutomlError::DataError("empty matrix".to_string()))?;
        let scale: Vec<f64> = x
            .data
            .std_axis(Axis(0), 0.0)
            .iter()
            .map(|&s| if s == 0.0 || !s.is_finite() { 1.0 } else { s })
            .collect();

        Ok(ScalerState {
            feature_names: x.names.clone(),
            mean: mean.to_vec(),
            scale,
        })
    }
}

/// Fitted standardization parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl ScalerState {
    /// Feature names in fitted order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Scale `x`. Columns are reordered to the fitted order when needed.
    pub fn transform(&self, x: &FeatureMatrix) -> Result<Array2<f64>> {
        let order = self.column_order(&x.names)?;
        let mut out = Array2::zeros((x.n_rows(), self.feature_names.len()));
        for (j, &src) in order.iter().enumerate() {
            let col = x.data.column(src);
            let (m, s) = (self.mean[j], self.scale[j]);
            out.column_mut(j)
                .iter_mut()
                .zip(col.iter())
                .for_each(|(o, &v)| *o = (v - m) / s);
        }
        Ok(out)
    }

    /// Scale one named feature row into a `1 x n_features` matrix
    pub fn transform_row(&self, row: &HashMap<String, f64>) -> Result<Array2<f64>> {
        let names: Vec<String> = row.keys().cloned().collect();
        self.check_names(&names)?;

        let mut out = Array2::zeros((1, self.feature_names.len()));
        for (j, name) in self.feature_names.iter().enumerate() {
            let v = row[name];
            if !v.is_finite() {
                return Err(AutomlError::InvalidParameter {
                    name: name.clone(),
                    value: v.to_string(),
                    reason: "feature values must be finite".to_string(),
                });
            }
            out[[0, j]] = (v - self.mean[j]) / self.scale[j];
        }
        Ok(out)
    }

    fn check_names(&self, names: &[String]) -> Result<()> {
        let expected: BTreeSet<&str> = self.feature_names.iter().map(|s| s.as_str()).collect();
        let actual: BTreeSet<&str> = names.iter().map(|s| s.as_str()).collect();
        if expected != actual || names.len() != self.feature_names.len() {
            let mut actual: Vec<String> = names.to_vec();
            actual.sort();
            return Err(AutomlError::SchemaMismatch {
                expected: self.feature_names.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// For each fitted feature, the index of the same name in `names`
    fn column_order(&self, names: &[String]) -> Result<Vec<usize>> {
        self.check_names(names)?;
        let order = self
            .feature_names
            .iter()
            .filter_map(|f| names.iter().position(|n| n == f))
            .collect();
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn matrix() -> FeatureMatrix {
        FeatureMatrix::new(
            vec!["a".into(), "b".into()],
            array![[1.0, 10.0], [2.0, 10.0], [3.0, 10.0], [4.0, 10.0], [5.0, 10.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_standard_scaler() {
        let x = matrix();
        let state = StandardScaler::fit(&x).unwrap();
        let scaled = state.transform(&x).unwrap();

        let mean = scaled.column(0).mean().unwrap();
        let var = scaled.column(0).mapv(|v| v * v).mean().unwrap();
        assert!(mean.abs() < 1e-10);
        assert!((var - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_constant_column_scales_by_one() {
        let x = matrix();
        let state = StandardScaler::fit(&x).unwrap();
        assert_eq!(state.scale()[1], 1.0);
        let scaled = state.transform(&x).unwrap();
        assert!(scaled.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_transform_reorders_columns() {
        let x = matrix();
        let state = StandardScaler::fit(&x).unwrap();

        let swapped = FeatureMatrix::new(
            vec!["b".into(), "a".into()],
            array![[10.0, 3.0]],
        )
        .unwrap();
        let scaled = state.transform(&swapped).unwrap();
        assert!(scaled[[0, 0]].abs() < 1e-10);
        assert_eq!(scaled[[0, 1]], 0.0);
    }

    #[test]
    fn test_transform_does_not_refit() {
        let state = StandardScaler::fit(&matrix()).unwrap();
        let before = state.clone();
        let other = FeatureMatrix::new(vec!["a".into(), "b".into()], array![[100.0, -4.0]]).unwrap();
        state.transform(&other).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn test_schema_mismatch() {
        let state = StandardScaler::fit(&matrix()).unwrap();
        let mut row = HashMap::new();
        row.insert("a".to_string(), 1.0);
        assert!(matches!(
            state.transform_row(&row),
            Err(AutomlError::SchemaMismatch { .. })
        ));

        row.insert("b".to_string(), 10.0);
        let scaled = state.transform_row(&row).unwrap();
        assert_eq!(scaled.shape(), &[1, 2]);

        row.insert("c".to_string(), 0.0);
        assert!(state.transform_row(&row).is_err());
    }

    #[test]
    fn test_transform_row_rejects_non_finite() {
        let state = StandardScaler::fit(&matrix()).unwrap();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut row = HashMap::new();
            row.insert("a".to_string(), 1.0);
            row.insert("b".to_string(), bad);
            match state.transform_row(&row) {
                Err(AutomlError::InvalidParameter { name, .. }) => assert_eq!(name, "b"),
                other => panic!("expected invalid parameter, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_fit_rejects_empty() {
        let empty = FeatureMatrix::new(vec!["a".into()], Array2::zeros((0, 1))).unwrap();
        assert!(matches!(StandardScaler::fit(&empty), Err(AutomlError::DataError(_))));
    }
}
