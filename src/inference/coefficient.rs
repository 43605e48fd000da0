//! Coefficient-level inference from a covariance matrix.

use faer::{Col, Mat};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// t-statistics, p-values and confidence intervals for coefficient vectors.
///
/// All tests are two-sided and use the t-distribution with the residual
/// degrees of freedom `n - p`.
pub struct CoefficientInference;

impl CoefficientInference {
    /// Standard errors from the diagonal of a covariance matrix.
    pub fn std_errors(vcov: &Mat<f64>) -> Col<f64> {
        Col::from_fn(vcov.nrows(), |j| {
            let var = vcov[(j, j)];
            if var >= 0.0 {
                var.sqrt()
            } else {
                f64::NAN
            }
        })
    }

    pub fn t_statistics(coefficients: &Col<f64>, std_errors: &Col<f64>) -> Col<f64> {
        Col::from_fn(coefficients.nrows(), |j| {
            let se = std_errors[j];
            if se > 0.0 {
                coefficients[j] / se
            } else {
                f64::NAN
            }
        })
    }

    pub fn p_values(t_statistics: &Col<f64>, df: f64) -> Col<f64> {
        let dist = StudentsT::new(0.0, 1.0, df).ok();
        Col::from_fn(t_statistics.nrows(), |j| {
            let t = t_statistics[j];
            match &dist {
                Some(d) if t.is_finite() => 2.0 * (1.0 - d.cdf(t.abs())),
                _ => f64::NAN,
            }
        })
    }

    /// Two-sided critical value `t_{df, 1 - (1 - level)/2}`.
    pub fn critical_value(df: f64, confidence_level: f64) -> f64 {
        StudentsT::new(0.0, 1.0, df).map_or(f64::NAN, |d| {
            d.inverse_cdf(1.0 - (1.0 - confidence_level) / 2.0)
        })
    }

    pub fn confidence_intervals(
        coefficients: &Col<f64>,
        std_errors: &Col<f64>,
        df: f64,
        confidence_level: f64,
    ) -> (Col<f64>, Col<f64>) {
        let t_crit = Self::critical_value(df, confidence_level);
        let lower = Col::from_fn(coefficients.nrows(), |j| {
            coefficients[j] - t_crit * std_errors[j]
        });
        let upper = Col::from_fn(coefficients.nrows(), |j| {
            coefficients[j] + t_crit * std_errors[j]
        });
        (lower, upper)
    }
}

/// Classical OLS covariance `σ² (X'X)^-1` with `σ² = RSS / (n - p)`.
pub fn classical_covariance(xtx_inv: &Mat<f64>, rss: f64, df: usize) -> Mat<f64> {
    let sigma2 = rss / df as f64;
    let p = xtx_inv.nrows();
    Mat::from_fn(p, p, |r, c| sigma2 * xtx_inv[(r, c)])
}
