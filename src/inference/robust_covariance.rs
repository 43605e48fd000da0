//! Heteroskedasticity-consistent (HC1) covariance.
//!
//! Sandwich formula:
//! `V_HC1 = (X'X)^-1 X' Ω X (X'X)^-1`, with `Ω = diag(n/(n-p) · e_i²)`.
//!
//! # References
//!
//! - White, H. (1980). "A Heteroskedasticity-Consistent Covariance Matrix Estimator
//!   and a Direct Test for Heteroskedasticity." *Econometrica*, 48(4), 817–838.
//! - MacKinnon, J.G. & White, H. (1985). "Some Heteroskedasticity-Consistent
//!   Covariance Matrix Estimators with Improved Finite Sample Properties."
//!   *Journal of Econometrics*, 29(3), 305–325.

use crate::utils::mat_mul;
use faer::{Col, Mat};

/// HC1 covariance of OLS coefficients.
///
/// # Arguments
/// * `x` - Full design matrix (n × p), intercept column included
/// * `residuals` - OLS residuals (n × 1)
/// * `xtx_inv` - `(X'X)^-1` (p × p)
pub fn hc1_covariance(x: &Mat<f64>, residuals: &Col<f64>, xtx_inv: &Mat<f64>) -> Mat<f64> {
    let n = x.nrows();
    let p = x.ncols();
    let scale = n as f64 / (n - p) as f64;

    // Meat: X' Ω X
    let mut meat: Mat<f64> = Mat::zeros(p, p);
    for i in 0..n {
        let w = scale * residuals[i] * residuals[i];
        for r in 0..p {
            for c in 0..p {
                meat[(r, c)] += w * x[(i, r)] * x[(i, c)];
            }
        }
    }

    let temp = mat_mul(xtx_inv, &meat);
    mat_mul(&temp, xtx_inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solvers::cholesky::{Cholesky, PIVOT_TOLERANCE};
    use crate::utils::{crossprod, mat_vec, xt_vec};
    use approx::assert_relative_eq;

    // R:
    // x <- c(1, 2, 3, 4, 5); y <- c(2.1, 4.3, 5.8, 8.2, 9.9)
    // sqrt(diag(sandwich::vcovHC(lm(y ~ x), type = "HC1")))  # 0.15796 0.04103
    #[test]
    fn test_hc1_matches_sandwich_reference() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = [2.1, 4.3, 5.8, 8.2, 9.9];
        let x = Mat::from_fn(5, 2, |i, j| if j == 0 { 1.0 } else { xs[i] });
        let y = Col::from_fn(5, |i| ys[i]);

        let chol = Cholesky::factor(&crossprod(&x), PIVOT_TOLERANCE).unwrap();
        let beta = chol.solve(&xt_vec(&x, &y));
        let fitted = mat_vec(&x, &beta);
        let residuals = Col::from_fn(5, |i| y[i] - fitted[i]);

        let vcov = hc1_covariance(&x, &residuals, &chol.inverse());
        assert_relative_eq!(vcov[(0, 0)].sqrt(), 0.15796, epsilon = 0.001);
        assert_relative_eq!(vcov[(1, 1)].sqrt(), 0.04103, epsilon = 0.001);
    }

    #[test]
    fn test_hc1_symmetric() {
        let x = Mat::from_fn(8, 2, |i, j| if j == 0 { 1.0 } else { (i * i) as f64 });
        let residuals = Col::from_fn(8, |i| (-1.0_f64).powi(i as i32) * (i as f64 + 1.0));
        let chol = Cholesky::factor(&crossprod(&x), PIVOT_TOLERANCE).unwrap();
        let vcov = hc1_covariance(&x, &residuals, &chol.inverse());
        assert_relative_eq!(vcov[(0, 1)], vcov[(1, 0)], epsilon = 1e-10);
        assert!(vcov[(1, 1)] > 0.0);
    }
}
