//! Two-stage regression analysis with predictive margins.
//!
//! Stage 1 regresses an outcome on controls and fixed effects and keeps the
//! residuals. After flagging residuals beyond `k` standard deviations, stage
//! 2 regresses the residuals on the full interaction of two factors and
//! predicts the mean residual at every combination of their levels.
//!
//! Coefficients come with classical, HC1 or cluster-robust standard errors,
//! t-statistics, p-values and confidence intervals.
//!
//! # Example
//!
//! ```rust,ignore
//! use twostage_regression::prelude::*;
//!
//! let roles = RoleAssignment {
//!     outcome: "satisfaction".into(),
//!     controls: vec!["age".into()],
//!     factor_a: "treatment".into(),
//!     factor_b: "wave".into(),
//!     ..Default::default()
//! };
//!
//! let stage1 = Pipeline::new().load(&dataset, roles)?.fit_stage1()?;
//! println!("{}", stage1.coefficient_table().to_json()?);
//!
//! let stage2 = stage1
//!     .diagnose(&ResidualDiagnostics::default())?
//!     .fit_stage2(&Stage2Options::default())?;
//! let margins = stage2.margins(0.90)?;
//! println!("{}", margins.to_csv()?);
//! ```

pub mod analysis;
pub mod core;
pub mod diagnostics;
pub mod inference;
pub mod solvers;
mod utils;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::analysis::{
        CoefficientTable, DataLoaded, Diagnosed, InteractionModel, InteractionModelBuilder,
        MarginsPredictor, MarginsTable, Pipeline, PipelineError, PredictionGrid, Stage,
        Stage1Fitted, Stage2Fitted, Stage2Options,
    };
    pub use crate::core::{
        AnalysisConfig, AnalysisError, AnalysisSample, CategoricalClassifier, CoefficientLabel,
        Column, ColumnData, CovarianceMode, Dataset, Factor, FitFailure, Formula, FormulaBuilder,
        Level, RegressionResult, RoleAssignment, VariableKind, VariableSanitizer, VariableSchema,
    };
    pub use crate::diagnostics::{
        condition_diagnostic, qq_points, ConditionDiagnostic, ResidualDiagnostics, ResidualReport,
        ResidualSummary,
    };
    pub use crate::inference::PredictionResult;
    pub use crate::solvers::{DesignLayout, FittedModel, OlsEngine};
}

pub use crate::analysis::{Pipeline, PipelineError, Stage};
pub use crate::core::{AnalysisConfig, AnalysisError, Dataset, RoleAssignment};
