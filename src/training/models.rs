//! Model trait and shared input checks

use crate::error::{AutomlError, Result};
use ndarray::{Array1, Array2};

/// Trait for regression models
pub trait Model: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn is_fitted(&self) -> bool;
}

/// Reject mismatched or empty training inputs
pub(crate) fn check_training_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(AutomlError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(AutomlError::DataError(format!(
            "cannot train on a {}x{} matrix",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(AutomlError::DataError(
            "training data contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

/// Reject prediction input with the wrong width
pub(crate) fn check_prediction_input(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(AutomlError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_training_input_checks() {
        assert!(check_training_input(&array![[1.0], [2.0]], &array![1.0, 2.0]).is_ok());
        assert!(matches!(
            check_training_input(&array![[1.0], [2.0]], &array![1.0]),
            Err(AutomlError::ShapeError { .. })
        ));
        assert!(matches!(
            check_training_input(&array![[f64::NAN]], &array![1.0]),
            Err(AutomlError::DataError(_))
        ));
    }

    #[test]
    fn test_prediction_input_checks() {
        assert!(check_prediction_input(&array![[1.0, 2.0]], 2).is_ok());
        assert!(check_prediction_input(&array![[1.0]], 2).is_err());
    }
}
