//! Confidence intervals for the mean response at new design rows.

use crate::inference::coefficient::CoefficientInference;
use crate::utils::{quad_form, row};
use faer::{Col, Mat};

/// Point predictions with standard errors and confidence bounds.
#[derive(Debug, Clone)]
pub struct PredictionResult {
    pub fit: Col<f64>,
    pub se: Col<f64>,
    pub lower: Col<f64>,
    pub upper: Col<f64>,
    pub confidence_level: f64,
}

/// Mean-response intervals `x'β ± t · sqrt(x' V x)`.
///
/// `vcov` is whichever coefficient covariance the model was fit with, so
/// robust and clustered errors carry over to the predictions.
pub fn compute_mean_intervals(
    x_new: &Mat<f64>,
    coefficients: &Col<f64>,
    vcov: &Mat<f64>,
    df: f64,
    confidence_level: f64,
) -> PredictionResult {
    let m = x_new.nrows();
    let t_crit = CoefficientInference::critical_value(df, confidence_level);

    let mut fit: Col<f64> = Col::zeros(m);
    let mut se: Col<f64> = Col::zeros(m);
    for i in 0..m {
        let x_i = row(x_new, i);
        let mut pred = 0.0;
        for j in 0..x_i.nrows() {
            pred += x_i[j] * coefficients[j];
        }
        fit[i] = pred;
        se[i] = quad_form(vcov, &x_i).max(0.0).sqrt();
    }

    let lower = Col::from_fn(m, |i| fit[i] - t_crit * se[i]);
    let upper = Col::from_fn(m, |i| fit[i] + t_crit * se[i]);
    PredictionResult {
        fit,
        se,
        lower,
        upper,
        confidence_level,
    }
}
