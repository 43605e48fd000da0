//! Core types: data, variable schema, classification, formulas, options.

pub mod classify;
pub mod config;
pub mod data;
pub mod error;
pub mod formula;
pub mod options;
pub mod result;
pub mod sample;
pub mod schema;

pub use classify::{CategoricalClassifier, VariableKind};
pub use config::{AnalysisConfig, ConfigKey, ConfigLoad, RejectedKey, CLUSTER_NONE_SENTINEL};
pub use data::{Column, ColumnData, ColumnType, Dataset, Level};
pub use error::{AnalysisError, FitFailure};
pub use formula::{CoefficientLabel, Factor, Formula, FormulaBuilder, LabelPart, Term};
pub use options::{
    validate_confidence_level, CovarianceMode, RoleAssignment, DEFAULT_CATEGORICAL_THRESHOLD,
    DEFAULT_CONFIDENCE_LEVEL, DEFAULT_EXTREME_MULTIPLE, DEFAULT_MARGINS_LEVEL,
};
pub use result::RegressionResult;
pub use sample::{AnalysisSample, ColumnSummary, SampleValues};
pub use schema::{Role, VariableEntry, VariableSanitizer, VariableSchema, RESIDUAL_COLUMN};
