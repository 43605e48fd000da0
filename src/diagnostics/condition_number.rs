//! Conditioning of a full design matrix.
//!
//! The condition number κ(X) = σ_max / σ_min measures how sensitive the
//! least-squares solution is to perturbations of the data. Columns are scaled
//! to unit length first, so κ reflects collinearity rather than the units a
//! variable happens to be measured in. The engine reports
//! it for every fit and logs a warning when collinearity is high; exact
//! singularity is rejected separately by the pivot check of the Cholesky
//! factorisation.
//!
//! # Interpretation
//!
//! - κ < 30: Well-conditioned, stable
//! - 30 ≤ κ < 100: Moderate collinearity
//! - 100 ≤ κ < 1000: High collinearity, potential instability
//! - κ ≥ 1000: Severe collinearity, numerical instability likely
//!
//! # References
//!
//! - Belsley, D.A., Kuh, E. and Welsch, R.E. (1980). Regression Diagnostics.

use faer::Mat;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionSeverity {
    WellConditioned,
    Moderate,
    High,
    Severe,
}

impl ConditionSeverity {
    pub fn classify(cond: f64) -> Self {
        if cond < 30.0 {
            Self::WellConditioned
        } else if cond < 100.0 {
            Self::Moderate
        } else if cond < 1000.0 {
            Self::High
        } else {
            Self::Severe
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::WellConditioned => "well-conditioned",
            Self::Moderate => "moderate collinearity",
            Self::High => "high collinearity",
            Self::Severe => "severe collinearity",
        }
    }
}

/// Singular-value summary of a design matrix.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionDiagnostic {
    pub condition_number: f64,
    /// Singular values of X, descending.
    pub singular_values: Vec<f64>,
    pub severity: ConditionSeverity,
    pub warning: Option<String>,
}

/// Condition diagnostics of `x` with unit-length columns (no intercept is
/// added).
pub fn condition_diagnostic(x: &Mat<f64>) -> ConditionDiagnostic {
    let severe = |warning: &str| ConditionDiagnostic {
        condition_number: f64::INFINITY,
        singular_values: Vec::new(),
        severity: ConditionSeverity::Severe,
        warning: Some(warning.to_string()),
    };

    if x.ncols() == 0 || x.nrows() == 0 {
        return severe("empty design matrix");
    }
    let scaled = scale_columns(x);
    let svd = match scaled.svd() {
        Ok(svd) => svd,
        Err(_) => return severe("singular value decomposition did not converge"),
    };
    let s_col = svd.S().column_vector();

    let mut singular_values: Vec<f64> = (0..s_col.nrows()).map(|i| s_col[i]).collect();
    singular_values.sort_by(|a, b| b.total_cmp(a));

    let s_max = singular_values[0];
    let s_min = singular_values.iter().rfind(|&&v| v > 0.0).copied().unwrap_or(0.0);
    let rank_deficient = singular_values.iter().any(|&v| v <= 0.0);
    let condition_number = if s_min > 0.0 && !rank_deficient {
        s_max / s_min
    } else {
        f64::INFINITY
    };

    let severity = ConditionSeverity::classify(condition_number);
    let warning = match severity {
        ConditionSeverity::WellConditioned | ConditionSeverity::Moderate => None,
        _ => Some(format!(
            "{} in design matrix (κ = {:.1}); coefficients may be unstable",
            severity.description(),
            condition_number
        )),
    };

    ConditionDiagnostic {
        condition_number,
        singular_values,
        severity,
        warning,
    }
}

/// Divide each column by its Euclidean norm; all-zero columns stay zero.
fn scale_columns(x: &Mat<f64>) -> Mat<f64> {
    let norms: Vec<f64> = (0..x.ncols())
        .map(|j| (0..x.nrows()).map(|i| x[(i, j)] * x[(i, j)]).sum::<f64>().sqrt())
        .collect();
    Mat::from_fn(x.nrows(), x.ncols(), |i, j| {
        if norms[j] > 0.0 {
            x[(i, j)] / norms[j]
        } else {
            0.0
        }
    })
}
