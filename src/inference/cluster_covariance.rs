//! Cluster-robust (Liang–Zeger) covariance.
//!
//! `V_CR = c · (X'X)^-1 B (X'X)^-1` where `B = Σ_g X_g' e_g e_g' X_g` and the
//! small-sample factor is `c = G/(G-1) · (N-1)/(N-K)`.
//!
//! # References
//!
//! - Liang, K.-Y. & Zeger, S.L. (1986). "Longitudinal data analysis using
//!   generalized linear models." *Biometrika*, 73(1), 13–22.
//! - Cameron, A.C. & Miller, D.L. (2015). "A Practitioner's Guide to
//!   Cluster-Robust Inference." *Journal of Human Resources*, 50(2), 317–372.

use crate::utils::mat_mul;
use faer::{Col, Mat};

/// Cluster-robust covariance of OLS coefficients.
///
/// `cluster_ids[i]` is the group of row `i`, numbered `0..n_clusters`.
pub fn cluster_robust_covariance(
    x: &Mat<f64>,
    residuals: &Col<f64>,
    xtx_inv: &Mat<f64>,
    cluster_ids: &[usize],
    n_clusters: usize,
) -> Mat<f64> {
    let n = x.nrows();
    let p = x.ncols();

    // Score for cluster g: s_g = X_g' e_g
    let mut scores: Mat<f64> = Mat::zeros(n_clusters, p);
    for i in 0..n {
        let g = cluster_ids[i];
        let e_i = residuals[i];
        for j in 0..p {
            scores[(g, j)] += x[(i, j)] * e_i;
        }
    }

    // Meat: Σ_g s_g s_g'
    let mut meat: Mat<f64> = Mat::zeros(p, p);
    for g in 0..n_clusters {
        for a in 0..p {
            for b in 0..p {
                meat[(a, b)] += scores[(g, a)] * scores[(g, b)];
            }
        }
    }

    let g = n_clusters as f64;
    let n_f = n as f64;
    let p_f = p as f64;
    let correction = if g > 1.0 && n_f > p_f {
        (g / (g - 1.0)) * ((n_f - 1.0) / (n_f - p_f))
    } else {
        1.0
    };

    let sandwich = mat_mul(&mat_mul(xtx_inv, &meat), xtx_inv);
    Mat::from_fn(p, p, |r, c| correction * sandwich[(r, c)])
}
