use ndarray::ArrayView1;

use crate::error::{MlErr, Result};

fn check(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(MlErr::SizeMismatch {
            a: "predictions",
            b: "targets",
            got: y_pred.len(),
            expected: y_true.len(),
        });
    }

    if y_true.is_empty() {
        return Err(MlErr::EmptyDataset);
    }

    Ok(())
}

/// Mean squared error.
pub fn mse(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
    check(y_true, y_pred)?;

    let total: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    Ok(total / y_true.len() as f64)
}

/// Root mean squared error.
pub fn rmse(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
    mse(y_true, y_pred).map(f64::sqrt)
}

/// Coefficient of determination. A constant target scores 1.0 on a perfect
/// fit and 0.0 otherwise.
pub fn r2(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64> {
    check(y_true, y_pred)?;

    let mean = y_true.sum() / y_true.len() as f64;
    let residual: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let total: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    if total == 0.0 {
        return Ok(if residual == 0.0 { 1.0 } else { 0.0 });
    }

    Ok(1.0 - residual / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rmse_of_known_errors() {
        let t = array![1.0, 2.0, 3.0, 4.0];
        let p = array![2.0, 2.0, 1.0, 4.0];
        // squared errors 1, 0, 4, 0
        assert_eq!(mse(t.view(), p.view()).unwrap(), 1.25);
        assert_eq!(rmse(t.view(), p.view()).unwrap(), 1.25f64.sqrt());
    }

    #[test]
    fn perfect_fit() {
        let t = array![0.5, 1.5, 2.5];
        assert_eq!(rmse(t.view(), t.view()).unwrap(), 0.0);
        assert_eq!(r2(t.view(), t.view()).unwrap(), 1.0);
    }

    #[test]
    fn r2_of_the_mean_predictor_is_zero() {
        let t = array![1.0, 2.0, 3.0];
        let p = array![2.0, 2.0, 2.0];
        assert_eq!(r2(t.view(), p.view()).unwrap(), 0.0);
    }

    #[test]
    fn rejects_mismatched_or_empty_inputs() {
        let t = array![1.0, 2.0];
        let p = array![1.0];
        assert!(rmse(t.view(), p.view()).is_err());

        let empty = ndarray::Array1::<f64>::zeros(0);
        assert!(matches!(
            rmse(empty.view(), empty.view()),
            Err(MlErr::EmptyDataset)
        ));
    }
}
