//! Categorical-versus-continuous classification of variables.

use crate::core::data::ColumnType;
use crate::core::error::AnalysisError;
use crate::core::options::DEFAULT_CATEGORICAL_THRESHOLD;
use crate::core::sample::SampleValues;
use serde::Serialize;

/// How a variable enters a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Categorical,
    Continuous,
}

impl VariableKind {
    /// Kind implied by storage type alone: text is a factor, numbers are
    /// regressors. Used for controls, which are never threshold-classified.
    pub fn from_column_type(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Text => Self::Categorical,
            ColumnType::Numeric => Self::Continuous,
        }
    }
}

/// Decides whether a variable is a discrete factor.
///
/// Text variables are always categorical. Numeric variables are categorical
/// when they take strictly fewer than `threshold` distinct values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoricalClassifier {
    threshold: usize,
}

impl Default for CategoricalClassifier {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CATEGORICAL_THRESHOLD,
        }
    }
}

impl CategoricalClassifier {
    pub fn new(threshold: usize) -> Result<Self, AnalysisError> {
        if threshold == 0 {
            return Err(AnalysisError::InvalidParameter(
                "categorical threshold must be at least 1".to_string(),
            ));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn classify(&self, values: &SampleValues) -> VariableKind {
        match values {
            SampleValues::Text(_) => VariableKind::Categorical,
            SampleValues::Numeric(v) => {
                if distinct_count(v) < self.threshold {
                    VariableKind::Categorical
                } else {
                    VariableKind::Continuous
                }
            }
        }
    }
}

fn distinct_count(values: &[f64]) -> usize {
    let mut sorted: Vec<f64> = values.iter().map(|v| v + 0.0).collect();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup_by(|a, b| a.total_cmp(b).is_eq());
    sorted.len()
}
