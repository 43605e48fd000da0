//! Ordinary least squares with plain, HC1 or cluster-robust inference.
//!
//! Coefficients solve the normal equations `X'X β = X'y` through a
//! pivot-checked Cholesky factorisation. A pivot that collapses relative to
//! its diagonal entry marks the corresponding design column as collinear with
//! the columns before it, and the fit is rejected naming that column.
//!
//! All confidence intervals use the t-distribution with `n - p` degrees of
//! freedom, whatever the covariance mode.

use crate::core::{
    validate_confidence_level, AnalysisError, AnalysisSample, CoefficientLabel, CovarianceMode,
    FitFailure, Formula, Level, RegressionResult, DEFAULT_CONFIDENCE_LEVEL,
};
use crate::diagnostics::condition_diagnostic;
use crate::inference::{
    classical_covariance, cluster_robust_covariance, compute_mean_intervals, hc1_covariance,
    CoefficientInference, PredictionResult,
};
use crate::solvers::cholesky::{Cholesky, PIVOT_TOLERANCE};
use crate::solvers::design::DesignLayout;
use crate::utils::{crossprod, mat_vec, xt_vec};
use faer::{Col, Mat};
use log::{debug, warn};
use std::collections::BTreeMap;

/// Least-squares engine for a structured [`Formula`].
///
/// # Example
///
/// ```rust,ignore
/// use twostage_regression::prelude::*;
///
/// let engine = OlsEngine::builder()
///     .covariance(CovarianceMode::Cluster)
///     .cluster_key("v_4")
///     .build();
/// let fitted = engine.fit(&formula, &sample)?;
/// println!("{}", fitted.result().r_squared);
/// ```
#[derive(Debug, Clone)]
pub struct OlsEngine {
    covariance: CovarianceMode,
    cluster_key: Option<String>,
    confidence_level: f64,
}

impl Default for OlsEngine {
    fn default() -> Self {
        Self::new(CovarianceMode::Plain)
    }
}

impl OlsEngine {
    pub fn new(covariance: CovarianceMode) -> Self {
        Self {
            covariance,
            cluster_key: None,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
        }
    }

    pub fn builder() -> OlsEngineBuilder {
        OlsEngineBuilder::default()
    }

    pub fn covariance(&self) -> CovarianceMode {
        self.covariance
    }

    pub fn fit(&self, formula: &Formula, sample: &AnalysisSample) -> Result<FittedModel, AnalysisError> {
        let cluster_key = match (self.covariance, &self.cluster_key) {
            (CovarianceMode::Cluster, None) => return Err(AnalysisError::MissingClusterVariable),
            (CovarianceMode::Cluster, Some(key)) => Some(key.as_str()),
            _ => None,
        };
        let confidence_level = validate_confidence_level(self.confidence_level)?;

        let y_values = sample.numeric(formula.outcome())?;
        let layout = DesignLayout::from_formula(formula, sample)?;
        let x = layout.build(sample)?;
        let y = Col::from_fn(y_values.len(), |i| y_values[i]);

        let n = x.nrows();
        let p = x.ncols();
        if n <= p {
            return Err(FitFailure::InsufficientDegreesOfFreedom {
                n_obs: n,
                n_params: p,
            }
            .into());
        }

        let clusters = match cluster_key {
            Some(key) => Some(cluster_ids(sample, key)?),
            None => None,
        };

        let chol = Cholesky::factor(&crossprod(&x), PIVOT_TOLERANCE).map_err(|j| {
            FitFailure::Singular(layout.label(j).cloned().unwrap_or(CoefficientLabel::Intercept))
        })?;
        let xtx_inv = chol.inverse();
        let coefficients = chol.solve(&xt_vec(&x, &y));

        let fitted_values = mat_vec(&x, &coefficients);
        let residuals = Col::from_fn(n, |i| y[i] - fitted_values[i]);

        let y_mean = y_values.iter().sum::<f64>() / n as f64;
        let mut rss = 0.0;
        let mut tss = 0.0;
        for i in 0..n {
            rss += residuals[i] * residuals[i];
            tss += (y[i] - y_mean).powi(2);
        }
        let df_residuals = n - p;
        let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 0.0 };
        let adj_r_squared = 1.0 - (1.0 - r_squared) * (n - 1) as f64 / df_residuals as f64;

        let condition = condition_diagnostic(&x);
        if let Some(message) = &condition.warning {
            warn!("{}", message);
        }

        let vcov = match (&clusters, self.covariance) {
            (Some((ids, g)), _) => cluster_robust_covariance(&x, &residuals, &xtx_inv, ids, *g),
            (None, CovarianceMode::Robust) => hc1_covariance(&x, &residuals, &xtx_inv),
            (None, _) => classical_covariance(&xtx_inv, rss, df_residuals),
        };

        let df = df_residuals as f64;
        let std_errors = CoefficientInference::std_errors(&vcov);
        let t_statistics = CoefficientInference::t_statistics(&coefficients, &std_errors);
        let p_values = CoefficientInference::p_values(&t_statistics, df);
        let (conf_interval_lower, conf_interval_upper) = CoefficientInference::confidence_intervals(
            &coefficients,
            &std_errors,
            df,
            confidence_level,
        );

        debug!(
            "fitted {} with {} observations, {} parameters ({} errors)",
            formula, n, p, self.covariance
        );

        Ok(FittedModel {
            formula: formula.clone(),
            layout,
            result: RegressionResult {
                coefficients,
                std_errors,
                t_statistics,
                p_values,
                conf_interval_lower,
                conf_interval_upper,
                confidence_level,
                vcov,
                covariance: self.covariance,
                n_clusters: clusters.map(|(_, g)| g),
                fitted_values,
                residuals,
                r_squared,
                adj_r_squared,
                rss,
                residual_std_error: (rss / df).sqrt(),
                n_observations: n,
                n_parameters: p,
                df_residuals,
                condition_number: condition.condition_number,
            },
        })
    }
}

/// Dense group ids in level order, plus the number of groups.
fn cluster_ids(sample: &AnalysisSample, key: &str) -> Result<(Vec<usize>, usize), AnalysisError> {
    let values = sample.values(key)?;
    let mut groups: BTreeMap<Level, usize> = BTreeMap::new();
    for i in 0..values.len() {
        groups.entry(values.level(i)).or_insert(0);
    }
    for (id, slot) in groups.values_mut().enumerate() {
        *slot = id;
    }
    let ids: Vec<usize> = (0..values.len()).map(|i| groups[&values.level(i)]).collect();

    let n_clusters = groups.len();
    if n_clusters < 2 {
        return Err(FitFailure::TooFewClusters {
            variable: key.to_string(),
            n_clusters,
        }
        .into());
    }
    Ok((ids, n_clusters))
}

/// Builder for [`OlsEngine`].
#[derive(Debug, Clone)]
pub struct OlsEngineBuilder {
    covariance: CovarianceMode,
    cluster_key: Option<String>,
    confidence_level: f64,
}

impl Default for OlsEngineBuilder {
    fn default() -> Self {
        Self {
            covariance: CovarianceMode::Plain,
            cluster_key: None,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
        }
    }
}

impl OlsEngineBuilder {
    pub fn covariance(mut self, mode: CovarianceMode) -> Self {
        self.covariance = mode;
        self
    }

    /// Grouping variable for cluster-robust errors. Ignored in other modes.
    pub fn cluster_key(mut self, key: impl Into<String>) -> Self {
        self.cluster_key = Some(key.into());
        self
    }

    pub fn maybe_cluster_key(mut self, key: Option<String>) -> Self {
        self.cluster_key = key;
        self
    }

    /// Level of the coefficient confidence intervals (default 0.95).
    pub fn confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn build(self) -> OlsEngine {
        OlsEngine {
            covariance: self.covariance,
            cluster_key: self.cluster_key,
            confidence_level: self.confidence_level,
        }
    }
}

/// A fitted least-squares model together with the design it was fit on.
#[derive(Debug, Clone)]
pub struct FittedModel {
    formula: Formula,
    layout: DesignLayout,
    result: RegressionResult,
}

impl FittedModel {
    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn layout(&self) -> &DesignLayout {
        &self.layout
    }

    pub fn result(&self) -> &RegressionResult {
        &self.result
    }

    pub fn labels(&self) -> Vec<CoefficientLabel> {
        self.layout.labels()
    }

    /// Estimated coefficient for a label, if the design has that column.
    pub fn coefficient(&self, label: &CoefficientLabel) -> Option<f64> {
        self.layout
            .labels()
            .iter()
            .position(|l| l == label)
            .map(|j| self.result.coefficients[j])
    }

    pub fn residuals(&self) -> &Col<f64> {
        &self.result.residuals
    }

    /// Mean response with confidence bounds at already-encoded design rows.
    ///
    /// Uses the model's own covariance, so robust and clustered errors carry
    /// over to the predictions.
    pub fn predict_mean(
        &self,
        x_new: &Mat<f64>,
        confidence_level: f64,
    ) -> Result<PredictionResult, AnalysisError> {
        let level = validate_confidence_level(confidence_level)?;
        if x_new.ncols() != self.layout.n_columns() {
            return Err(AnalysisError::InvalidParameter(format!(
                "prediction rows have {} columns, the design has {}",
                x_new.ncols(),
                self.layout.n_columns()
            )));
        }
        Ok(compute_mean_intervals(
            x_new,
            &self.result.coefficients,
            &self.result.vcov,
            self.result.df_residuals as f64,
            level,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, Dataset, FormulaBuilder, LabelPart, VariableKind, VariableSanitizer};
    use approx::assert_relative_eq;

    fn sample(columns: Vec<Column>) -> AnalysisSample {
        let names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();
        let dataset = Dataset::new(columns).unwrap();
        let schema = VariableSanitizer::default().sanitize(names.iter().map(String::as_str));
        AnalysisSample::from_dataset(&dataset, &schema).unwrap()
    }

    fn simple_formula() -> Formula {
        FormulaBuilder::new("v_0")
            .control("v_1", VariableKind::Continuous)
            .build()
            .unwrap()
    }

    #[test]
    fn test_exact_line() {
        let s = sample(vec![
            Column::from_f64("y", [3.0, 5.0, 7.0, 9.0, 11.0]),
            Column::from_f64("x", [1.0, 2.0, 3.0, 4.0, 5.0]),
        ]);
        let fitted = OlsEngine::default().fit(&simple_formula(), &s).unwrap();
        let r = fitted.result();
        assert_relative_eq!(r.coefficients[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(r.coefficients[1], 2.0, epsilon = 1e-10);
        assert_relative_eq!(r.r_squared, 1.0, epsilon = 1e-10);
        assert_eq!(r.df_residuals, 3);
    }

    #[test]
    fn test_plain_standard_errors_match_closed_form() {
        // y = 2.1, 4.3, 5.8, 8.2, 9.9 on x = 1..5:
        // slope 1.95, intercept 0.21, RSS = 0.147
        let s = sample(vec![
            Column::from_f64("y", [2.1, 4.3, 5.8, 8.2, 9.9]),
            Column::from_f64("x", [1.0, 2.0, 3.0, 4.0, 5.0]),
        ]);
        let fitted = OlsEngine::default().fit(&simple_formula(), &s).unwrap();
        let r = fitted.result();
        assert_relative_eq!(r.coefficients[0], 0.21, epsilon = 1e-10);
        assert_relative_eq!(r.coefficients[1], 1.95, epsilon = 1e-10);
        assert_relative_eq!(r.rss, 0.147, epsilon = 1e-10);
        // se(slope) = sqrt(σ² / Sxx), σ² = 0.147 / 3, Sxx = 10
        assert_relative_eq!(r.std_errors[1], (0.147_f64 / 3.0 / 10.0).sqrt(), epsilon = 1e-10);
        assert!(r.conf_interval_lower[1] < 1.95 && 1.95 < r.conf_interval_upper[1]);
    }

    #[test]
    fn test_residuals_sum_to_zero() {
        let s = sample(vec![
            Column::from_f64("y", [1.3, 0.2, 4.4, 2.9, 3.1, 5.0, 0.7]),
            Column::from_f64("x", [0.1, 0.9, 2.2, 1.1, 3.4, 2.8, 0.5]),
        ]);
        let fitted = OlsEngine::builder()
            .covariance(CovarianceMode::Robust)
            .build()
            .fit(&simple_formula(), &s)
            .unwrap();
        let total: f64 = fitted.result().residuals_vec().iter().sum();
        assert!(total.abs() < 1e-10);
    }

    #[test]
    fn test_cluster_without_key_is_rejected() {
        let s = sample(vec![
            Column::from_f64("y", [1.0, 2.0, 3.0, 5.0]),
            Column::from_f64("x", [1.0, 2.0, 3.0, 4.0]),
        ]);
        let err = OlsEngine::new(CovarianceMode::Cluster)
            .fit(&simple_formula(), &s)
            .unwrap_err();
        assert_eq!(err, AnalysisError::MissingClusterVariable);
    }

    #[test]
    fn test_single_cluster_is_rejected() {
        let s = sample(vec![
            Column::from_f64("y", [1.0, 2.0, 3.0, 5.0]),
            Column::from_f64("x", [1.0, 2.0, 3.0, 4.0]),
            Column::from_strs("g", ["a", "a", "a", "a"]),
        ]);
        let err = OlsEngine::builder()
            .covariance(CovarianceMode::Cluster)
            .cluster_key("v_2")
            .build()
            .fit(&simple_formula(), &s)
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::ModelFit(FitFailure::TooFewClusters { n_clusters: 1, .. })
        ));
    }

    #[test]
    fn test_cluster_mode_reports_group_count() {
        let s = sample(vec![
            Column::from_f64("y", [1.0, 2.5, 2.9, 4.1, 5.2, 5.8, 7.4, 8.0]),
            Column::from_f64("x", [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]),
            Column::from_f64("g", [1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0]),
        ]);
        let fitted = OlsEngine::builder()
            .covariance(CovarianceMode::Cluster)
            .cluster_key("v_2")
            .build()
            .fit(&simple_formula(), &s)
            .unwrap();
        assert_eq!(fitted.result().n_clusters, Some(4));
        assert!(fitted.result().std_errors[1] > 0.0);
    }

    #[test]
    fn test_collinear_column_is_named() {
        let s = sample(vec![
            Column::from_f64("y", [1.0, 3.0, 2.0, 5.0, 4.0]),
            Column::from_f64("x", [1.0, 2.0, 3.0, 4.0, 5.0]),
            Column::from_f64("z", [2.0, 4.0, 6.0, 8.0, 10.0]),
        ]);
        let formula = FormulaBuilder::new("v_0")
            .control("v_1", VariableKind::Continuous)
            .control("v_2", VariableKind::Continuous)
            .build()
            .unwrap();
        let err = OlsEngine::default().fit(&formula, &s).unwrap_err();
        let expected = CoefficientLabel::Effect(vec![LabelPart {
            variable: "v_2".into(),
            level: None,
        }]);
        assert_eq!(err, AnalysisError::ModelFit(FitFailure::Singular(expected)));
    }

    #[test]
    fn test_too_few_observations() {
        let s = sample(vec![
            Column::from_f64("y", [1.0, 2.0]),
            Column::from_f64("x", [1.0, 2.0]),
        ]);
        let err = OlsEngine::default().fit(&simple_formula(), &s).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::ModelFit(FitFailure::InsufficientDegreesOfFreedom { .. })
        ));
    }

    #[test]
    fn test_predict_mean_at_observed_row_matches_fitted() {
        let s = sample(vec![
            Column::from_f64("y", [2.1, 4.3, 5.8, 8.2, 9.9]),
            Column::from_f64("x", [1.0, 2.0, 3.0, 4.0, 5.0]),
        ]);
        let fitted = OlsEngine::default().fit(&simple_formula(), &s).unwrap();
        let x_new = Mat::from_fn(1, 2, |_, j| if j == 0 { 1.0 } else { 3.0 });
        let pred = fitted.predict_mean(&x_new, 0.9).unwrap();
        assert_relative_eq!(pred.fit[0], fitted.result().fitted_values[2], epsilon = 1e-10);
        assert!(pred.lower[0] < pred.fit[0] && pred.fit[0] < pred.upper[0]);
        assert!(fitted.predict_mean(&x_new, 1.0).is_err());
    }
}
