//! Numeric output of one least-squares fit.

use crate::core::options::CovarianceMode;
use faer::{Col, Mat};

/// Coefficients, their inference and goodness-of-fit statistics.
///
/// Every per-coefficient vector is indexed like the design columns, with the
/// intercept at position 0.
#[derive(Debug, Clone)]
pub struct RegressionResult {
    pub coefficients: Col<f64>,
    pub std_errors: Col<f64>,
    pub t_statistics: Col<f64>,
    pub p_values: Col<f64>,
    pub conf_interval_lower: Col<f64>,
    pub conf_interval_upper: Col<f64>,
    pub confidence_level: f64,

    /// Coefficient covariance under the selected mode.
    pub vcov: Mat<f64>,
    pub covariance: CovarianceMode,
    /// Number of groups when cluster-robust errors were used.
    pub n_clusters: Option<usize>,

    pub fitted_values: Col<f64>,
    pub residuals: Col<f64>,

    pub r_squared: f64,
    pub adj_r_squared: f64,
    /// Residual sum of squares.
    pub rss: f64,
    /// `sqrt(RSS / (n - p))`
    pub residual_std_error: f64,

    pub n_observations: usize,
    /// Number of coefficients, intercept included.
    pub n_parameters: usize,
    pub df_residuals: usize,

    /// κ of the design matrix with unit-length columns.
    pub condition_number: f64,
}

impl RegressionResult {
    pub fn residuals_vec(&self) -> Vec<f64> {
        (0..self.residuals.nrows()).map(|i| self.residuals[i]).collect()
    }
}
