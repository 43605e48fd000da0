//! Coefficient and margins tables in user-facing naming, exportable as JSON
//! or CSV.

use crate::analysis::margins::PredictionGrid;
use crate::core::{AnalysisError, Level, VariableSchema};
use crate::solvers::FittedModel;
use serde::Serialize;
use std::fmt::Display;

fn export_error(e: impl Display) -> AnalysisError {
    AnalysisError::Export(e.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, AnalysisError> {
    serde_json::to_string_pretty(value).map_err(export_error)
}

fn to_csv(header: Vec<String>, records: Vec<Vec<String>>) -> Result<String, AnalysisError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(&header).map_err(export_error)?;
    for record in &records {
        wtr.write_record(record).map_err(export_error)?;
    }
    let bytes = wtr.into_inner().map_err(export_error)?;
    String::from_utf8(bytes).map_err(export_error)
}

/// One coefficient with its inference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientRow {
    /// Term label in original naming, e.g. `C(region)[T.north]`
    pub term: String,
    /// Point estimate
    pub coef: f64,
    /// Standard error under the fit's covariance mode
    pub std_err: f64,
    /// t statistic `coef / std_err`
    pub t: f64,
    /// Two-sided p-value with `n - p` degrees of freedom
    pub p_value: f64,
    /// Lower confidence bound
    pub ci_lower: f64,
    /// Upper confidence bound
    pub ci_upper: f64,
}

/// Coefficient estimates of one fit with model-level statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientTable {
    pub formula: String,
    pub covariance: String,
    pub confidence_level: f64,
    pub n_observations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_clusters: Option<usize>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub residual_std_error: f64,
    pub rows: Vec<CoefficientRow>,
}

impl CoefficientTable {
    pub fn new(fitted: &FittedModel, schema: &VariableSchema) -> Self {
        let name = |v: &str| schema.display_name(v).to_string();
        let r = fitted.result();
        let rows = fitted
            .labels()
            .iter()
            .enumerate()
            .map(|(j, label)| CoefficientRow {
                term: label.render(name),
                coef: r.coefficients[j],
                std_err: r.std_errors[j],
                t: r.t_statistics[j],
                p_value: r.p_values[j],
                ci_lower: r.conf_interval_lower[j],
                ci_upper: r.conf_interval_upper[j],
            })
            .collect();
        Self {
            formula: fitted.formula().render(name),
            covariance: r.covariance.to_string(),
            confidence_level: r.confidence_level,
            n_observations: r.n_observations,
            n_clusters: r.n_clusters,
            r_squared: r.r_squared,
            adj_r_squared: r.adj_r_squared,
            residual_std_error: r.residual_std_error,
            rows,
        }
    }

    pub fn row(&self, term: &str) -> Option<&CoefficientRow> {
        self.rows.iter().find(|r| r.term == term)
    }

    pub fn to_json(&self) -> Result<String, AnalysisError> {
        to_json(self)
    }

    /// One line per coefficient.
    pub fn to_csv(&self) -> Result<String, AnalysisError> {
        let header = ["term", "coef", "std_err", "t", "p_value", "ci_lower", "ci_upper"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let records = self
            .rows
            .iter()
            .map(|r| {
                vec![
                    r.term.clone(),
                    r.coef.to_string(),
                    r.std_err.to_string(),
                    r.t.to_string(),
                    r.p_value.to_string(),
                    r.ci_lower.to_string(),
                    r.ci_upper.to_string(),
                ]
            })
            .collect();
        to_csv(header, records)
    }
}

/// Control value shared by every grid row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeldControl {
    pub variable: String,
    pub value: Level,
}

/// Predicted mean for one factor combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginsRow {
    /// Level of the first factor
    pub level_a: Level,
    /// Level of the second factor
    pub level_b: Level,
    /// Predicted mean of the residual outcome
    pub mean: f64,
    /// Standard error of the predicted mean
    pub se: f64,
    /// Lower confidence bound
    pub ci_lower: f64,
    /// Upper confidence bound
    pub ci_upper: f64,
}

/// Predicted means over the factor grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginsTable {
    pub factor_a: String,
    pub factor_b: String,
    pub confidence_level: f64,
    pub held: Vec<HeldControl>,
    pub rows: Vec<MarginsRow>,
}

impl MarginsTable {
    pub fn new(grid: &PredictionGrid, schema: &VariableSchema) -> Self {
        let name = |v: &str| schema.display_name(v).to_string();
        Self {
            factor_a: name(&grid.factor_a),
            factor_b: name(&grid.factor_b),
            confidence_level: grid.confidence_level,
            held: grid
                .held
                .iter()
                .map(|h| HeldControl {
                    variable: name(&h.variable),
                    value: h.value.clone(),
                })
                .collect(),
            rows: grid
                .rows
                .iter()
                .map(|r| MarginsRow {
                    level_a: r.level_a.clone(),
                    level_b: r.level_b.clone(),
                    mean: r.mean,
                    se: r.se,
                    ci_lower: r.lower,
                    ci_upper: r.upper,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_json(&self) -> Result<String, AnalysisError> {
        to_json(self)
    }

    /// Columns: factor A, factor B, each held control, then the estimate.
    pub fn to_csv(&self) -> Result<String, AnalysisError> {
        let mut header = vec![self.factor_a.clone(), self.factor_b.clone()];
        header.extend(self.held.iter().map(|h| h.variable.clone()));
        header.extend(["mean", "se", "ci_lower", "ci_upper"].map(String::from));

        let records = self
            .rows
            .iter()
            .map(|r| {
                let mut record = vec![r.level_a.to_string(), r.level_b.to_string()];
                record.extend(self.held.iter().map(|h| h.value.to_string()));
                record.extend([r.mean, r.se, r.ci_lower, r.ci_upper].map(|v| v.to_string()));
                record
            })
            .collect();
        to_csv(header, records)
    }
}
