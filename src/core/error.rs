//! Error taxonomy shared by every stage of the analysis.

use crate::core::formula::CoefficientLabel;
use crate::core::schema::VariableSchema;
use thiserror::Error;

/// Reasons a least-squares fit can be rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitFailure {
    /// The design matrix is rank deficient at this column.
    #[error("design column `{0}` is collinear with earlier columns or has no variation")]
    Singular(CoefficientLabel),

    /// Fewer observations than parameters plus one.
    #[error("{n_obs} observations are not enough to estimate {n_params} parameters")]
    InsufficientDegreesOfFreedom { n_obs: usize, n_params: usize },

    /// The cluster key has fewer than two groups in the sample.
    #[error("cluster variable `{variable}` defines {n_clusters} group(s); at least 2 are required")]
    TooFewClusters { variable: String, n_clusters: usize },

    /// A decomposition or distribution call failed.
    #[error("numerical failure: {0}")]
    Numerical(String),
}

/// Errors surfaced by the analysis core.
///
/// Variable names carried by the variants are internal identifiers while the
/// error travels through the solvers; the pipeline rewrites them to the
/// user-facing names with [`AnalysisError::with_original_names`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// The dataset is malformed (ragged or duplicate columns).
    #[error("data load error: {0}")]
    DataLoad(String),

    /// A selected variable is not a column of the dataset.
    #[error("undefined variable `{variable}`")]
    UndefinedVariable { variable: String },

    /// A numeric operation was asked of a text variable.
    #[error("variable `{variable}` is not numeric")]
    NonNumeric { variable: String },

    /// The least-squares fit was rejected.
    #[error("model fit error: {0}")]
    ModelFit(#[from] FitFailure),

    /// Cluster mode without a cluster variable.
    #[error("cluster-robust covariance requested but no cluster variable is selected")]
    MissingClusterVariable,

    /// An interaction factor was classified as continuous.
    #[error("margins require two categorical factors; continuous: `{}`", .continuous.join("`, `"))]
    UnsupportedMarginsConfiguration { continuous: Vec<String> },

    /// One variable fills several roles of a single model.
    #[error("variable `{variable}` appears in more than one role of the same model: {}", .roles.join(", "))]
    DuplicateVariable { variable: String, roles: Vec<String> },

    /// A tuning value is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A required configuration key is empty.
    #[error("configuration key `{key}` is not set")]
    IncompleteConfiguration { key: String },

    /// Serializing a result table failed.
    #[error("export failed: {0}")]
    Export(String),
}

impl AnalysisError {
    /// Rewrite internal identifiers to the names the user picked.
    pub fn with_original_names(self, schema: &VariableSchema) -> Self {
        let name = |safe: String| schema.display_name(&safe).to_string();
        match self {
            Self::UndefinedVariable { variable } => Self::UndefinedVariable {
                variable: name(variable),
            },
            Self::NonNumeric { variable } => Self::NonNumeric {
                variable: name(variable),
            },
            Self::ModelFit(FitFailure::Singular(label)) => Self::ModelFit(FitFailure::Singular(
                label.map_names(|v| schema.display_name(v).to_string()),
            )),
            Self::ModelFit(FitFailure::TooFewClusters {
                variable,
                n_clusters,
            }) => Self::ModelFit(FitFailure::TooFewClusters {
                variable: name(variable),
                n_clusters,
            }),
            Self::UnsupportedMarginsConfiguration { continuous } => {
                Self::UnsupportedMarginsConfiguration {
                    continuous: continuous.into_iter().map(name).collect(),
                }
            }
            Self::DuplicateVariable { variable, roles } => Self::DuplicateVariable {
                variable: name(variable),
                roles,
            },
            other => other,
        }
    }
}
