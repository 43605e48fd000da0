//! Role assignments, covariance modes and tuning defaults.

use crate::core::error::AnalysisError;
use crate::core::schema::Role;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Distinct-value count below which a numeric variable is treated as a factor.
pub const DEFAULT_CATEGORICAL_THRESHOLD: usize = 15;

/// Multiple of the residual standard deviation beyond which a residual is extreme.
pub const DEFAULT_EXTREME_MULTIPLE: f64 = 3.0;

/// Confidence level used for coefficient intervals.
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Confidence level used for predictive margins.
pub const DEFAULT_MARGINS_LEVEL: f64 = 0.90;

/// How coefficient standard errors are estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CovarianceMode {
    /// Classical OLS errors under homoskedasticity.
    #[default]
    #[serde(rename = "none")]
    Plain,
    /// HC1 heteroskedasticity-consistent sandwich.
    Robust,
    /// Liang–Zeger sandwich over groups of a cluster key.
    Cluster,
}

impl fmt::Display for CovarianceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Plain => "nonrobust",
            Self::Robust => "HC1",
            Self::Cluster => "cluster",
        };
        f.write_str(s)
    }
}

/// Which column plays which part in both stages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoleAssignment {
    pub outcome: String,
    pub controls: Vec<String>,
    pub fixed_effects: Vec<String>,
    pub covariance: CovarianceMode,
    pub cluster: Option<String>,
    pub factor_a: String,
    pub factor_b: String,
    pub stage2_controls: Vec<String>,
}

impl RoleAssignment {
    /// Every referenced variable with its role, in a stable order.
    ///
    /// The cluster key is listed only when cluster-robust covariance is
    /// selected.
    pub fn referenced(&self) -> impl Iterator<Item = (&str, Role)> + '_ {
        let cluster = match self.covariance {
            CovarianceMode::Cluster => self.cluster.as_deref(),
            _ => None,
        };
        std::iter::once((self.outcome.as_str(), Role::Outcome))
            .chain(self.controls.iter().map(|c| (c.as_str(), Role::Control)))
            .chain(
                self.fixed_effects
                    .iter()
                    .map(|c| (c.as_str(), Role::FixedEffect)),
            )
            .chain(std::iter::once((self.factor_a.as_str(), Role::FactorA)))
            .chain(std::iter::once((self.factor_b.as_str(), Role::FactorB)))
            .chain(
                self.stage2_controls
                    .iter()
                    .map(|c| (c.as_str(), Role::Stage2Control)),
            )
            .chain(cluster.map(|c| (c, Role::ClusterKey)))
    }
}

/// Reject confidence levels outside the open interval (0, 1).
pub fn validate_confidence_level(level: f64) -> Result<f64, AnalysisError> {
    if level > 0.0 && level < 1.0 {
        Ok(level)
    } else {
        Err(AnalysisError::InvalidParameter(format!(
            "confidence level must lie strictly between 0 and 1, got {}",
            level
        )))
    }
}
