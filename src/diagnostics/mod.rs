//! Regression diagnostics.
//!
//! - **Residuals**: summary statistics, `k·σ` extreme flags and normal Q-Q
//!   positions for the stage-1 residuals
//! - **Condition number**: collinearity check of a design matrix

mod condition_number;
mod residuals;

pub use condition_number::{condition_diagnostic, ConditionDiagnostic, ConditionSeverity};
pub use residuals::{
    qq_points, QqPoint, ResidualDiagnostics, ResidualRecord, ResidualReport, ResidualSummary,
};
