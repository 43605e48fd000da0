//! Two-stage analysis as a state machine.
//!
//! ```text
//! Pipeline ──load──▶ DataLoaded ──fit_stage1──▶ Stage1Fitted ──diagnose──▶ Diagnosed
//!                                                                           │  ▲
//!                                                              fit_stage2   ▼  │ diagnosed
//!                                                                        Stage2Fitted
//! ```
//!
//! Every transition borrows the current state and returns a new one, so a
//! failed stage leaves the previous state intact and re-runnable. Stage 2
//! can be fit any number of times from the same [`Diagnosed`] state.

use crate::analysis::export::{CoefficientTable, MarginsTable};
use crate::analysis::interaction::{InteractionModel, InteractionModelBuilder};
use crate::analysis::margins::{MarginsPredictor, PredictionGrid};
use crate::core::{
    validate_confidence_level, AnalysisConfig, AnalysisError, AnalysisSample,
    CategoricalClassifier, ColumnSummary, CovarianceMode, Dataset, FormulaBuilder, RoleAssignment,
    SampleValues, VariableKind, VariableSchema, DEFAULT_CONFIDENCE_LEVEL, RESIDUAL_COLUMN,
};
use crate::diagnostics::{qq_points, QqPoint, ResidualDiagnostics, ResidualReport, ResidualSummary};
use crate::solvers::{FittedModel, OlsEngine};
use log::info;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Stage in which a pipeline error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Stage1,
    Diagnostics,
    Stage2,
    Margins,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Load => "load",
            Self::Stage1 => "stage 1",
            Self::Diagnostics => "diagnostics",
            Self::Stage2 => "stage 2",
            Self::Margins => "margins",
        };
        f.write_str(s)
    }
}

/// An [`AnalysisError`] tagged with its stage, in user-facing naming.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    pub source: AnalysisError,
}

impl PipelineError {
    /// Error raised by the solvers, whose variable names are internal ids.
    fn new(stage: Stage, schema: &VariableSchema, source: AnalysisError) -> Self {
        Self {
            stage,
            source: source.with_original_names(schema),
        }
    }

    /// Error that already names variables as the user does.
    fn original(stage: Stage, source: AnalysisError) -> Self {
        Self { stage, source }
    }
}

/// Variables, schema and complete-case sample shared by all later states.
#[derive(Debug)]
struct Context {
    roles: RoleAssignment,
    schema: VariableSchema,
    sample: AnalysisSample,
    classifier: CategoricalClassifier,
}

impl Context {
    fn safe(&self, stage: Stage, original: &str) -> Result<String, PipelineError> {
        self.schema
            .safe_name(original)
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::original(
                    stage,
                    AnalysisError::UndefinedVariable {
                        variable: original.to_string(),
                    },
                )
            })
    }

    fn safe_all(&self, stage: Stage, originals: &[String]) -> Result<Vec<String>, PipelineError> {
        originals.iter().map(|v| self.safe(stage, v)).collect()
    }

    fn engine(&self, stage: Stage, confidence_level: f64) -> Result<OlsEngine, PipelineError> {
        let cluster_key = match (&self.roles.covariance, &self.roles.cluster) {
            (CovarianceMode::Cluster, Some(c)) => Some(self.safe(stage, c)?),
            _ => None,
        };
        Ok(OlsEngine::builder()
            .covariance(self.roles.covariance)
            .maybe_cluster_key(cluster_key)
            .confidence_level(confidence_level)
            .build())
    }

    fn fail(&self, stage: Stage) -> impl Fn(AnalysisError) -> PipelineError + '_ {
        move |e| PipelineError::new(stage, &self.schema, e)
    }
}

/// Unconfigured pipeline holding the tuning parameters.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    classifier: CategoricalClassifier,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct-value count below which a numeric interaction factor is
    /// categorical (default 15).
    pub fn categorical_threshold(mut self, threshold: usize) -> Result<Self, AnalysisError> {
        self.classifier = CategoricalClassifier::new(threshold)?;
        Ok(self)
    }

    /// Bind a dataset and role assignment and build the complete-case sample.
    pub fn load(&self, dataset: &Dataset, roles: RoleAssignment) -> Result<DataLoaded, PipelineError> {
        let schema = VariableSchema::from_roles(&roles);
        let fail = |e| PipelineError::original(Stage::Load, e);

        for (key, value) in [
            ("dep_var", &roles.outcome),
            ("interact_var1", &roles.factor_a),
            ("interact_var2", &roles.factor_b),
        ] {
            if value.is_empty() {
                return Err(fail(AnalysisError::IncompleteConfiguration {
                    key: key.to_string(),
                }));
            }
        }
        for (name, _) in roles.referenced() {
            if dataset.column(name).is_none() {
                return Err(fail(AnalysisError::UndefinedVariable {
                    variable: name.to_string(),
                }));
            }
        }

        let sample = AnalysisSample::from_dataset(dataset, &schema).map_err(fail)?;
        info!(
            "loaded {} variables; {} complete rows",
            schema.len(),
            sample.len()
        );
        Ok(DataLoaded {
            ctx: Arc::new(Context {
                roles,
                schema,
                sample,
                classifier: self.classifier,
            }),
        })
    }

    /// Resolve a configuration payload into roles and load.
    pub fn load_config(
        &self,
        dataset: &Dataset,
        config: &AnalysisConfig,
    ) -> Result<DataLoaded, PipelineError> {
        let roles = config
            .resolve()
            .map_err(|e| PipelineError::original(Stage::Load, e))?;
        self.load(dataset, roles)
    }
}

/// Data bound; nothing fitted yet.
#[derive(Debug, Clone)]
pub struct DataLoaded {
    ctx: Arc<Context>,
}

impl DataLoaded {
    pub fn roles(&self) -> &RoleAssignment {
        &self.ctx.roles
    }

    pub fn schema(&self) -> &VariableSchema {
        &self.ctx.schema
    }

    pub fn sample(&self) -> &AnalysisSample {
        &self.ctx.sample
    }

    pub fn describe(&self) -> Vec<ColumnSummary> {
        self.ctx.sample.describe(&self.ctx.schema)
    }

    /// Fit `outcome ~ controls + C(fixed effects)` on the full sample.
    ///
    /// Text controls expand to indicators; numeric controls enter linearly.
    pub fn fit_stage1(&self) -> Result<Stage1Fitted, PipelineError> {
        let ctx = &self.ctx;
        let fail = ctx.fail(Stage::Stage1);

        let mut builder = FormulaBuilder::new(ctx.safe(Stage::Stage1, &ctx.roles.outcome)?);
        for control in ctx.safe_all(Stage::Stage1, &ctx.roles.controls)? {
            let kind = VariableKind::from_column_type(
                ctx.sample.values(&control).map_err(&fail)?.column_type(),
            );
            builder = builder.control(control, kind);
        }
        for fe in ctx.safe_all(Stage::Stage1, &ctx.roles.fixed_effects)? {
            builder = builder.fixed_effect(fe);
        }
        let formula = builder.build().map_err(&fail)?;

        let engine = ctx.engine(Stage::Stage1, DEFAULT_CONFIDENCE_LEVEL)?;
        let fitted = engine.fit(&formula, &ctx.sample).map_err(&fail)?;
        info!(
            "stage 1 fitted: {} (R² = {:.4})",
            formula.render(|v| ctx.schema.display_name(v).to_string()),
            fitted.result().r_squared
        );
        Ok(Stage1Fitted {
            ctx: Arc::clone(&self.ctx),
            stage1: Arc::new(fitted),
        })
    }
}

/// Stage-1 model available.
#[derive(Debug, Clone)]
pub struct Stage1Fitted {
    ctx: Arc<Context>,
    stage1: Arc<FittedModel>,
}

impl Stage1Fitted {
    pub fn stage1(&self) -> &FittedModel {
        &self.stage1
    }

    pub fn schema(&self) -> &VariableSchema {
        &self.ctx.schema
    }

    pub fn coefficient_table(&self) -> CoefficientTable {
        CoefficientTable::new(&self.stage1, &self.ctx.schema)
    }

    /// Flag stage-1 residuals beyond the dispersion multiple.
    pub fn diagnose(&self, diagnostics: &ResidualDiagnostics) -> Result<Diagnosed, PipelineError> {
        let residuals = self.stage1.result().residuals_vec();
        let report = diagnostics
            .diagnose(&residuals)
            .map_err(self.ctx.fail(Stage::Diagnostics))?;
        info!(
            "diagnostics: {} of {} residuals beyond {}σ",
            report.summary.n_extreme,
            report.summary.n,
            diagnostics.multiple()
        );
        Ok(Diagnosed {
            ctx: Arc::clone(&self.ctx),
            stage1: Arc::clone(&self.stage1),
            report: Arc::new(report),
        })
    }
}

/// Options of one stage-2 run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stage2Options {
    /// Drop rows flagged extreme before fitting.
    pub exclude_extremes: bool,
    /// Level of the coefficient intervals.
    pub confidence_level: f64,
}

impl Default for Stage2Options {
    fn default() -> Self {
        Self {
            exclude_extremes: true,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
        }
    }
}

impl Stage2Options {
    pub fn exclude_extremes(mut self, exclude: bool) -> Self {
        self.exclude_extremes = exclude;
        self
    }

    pub fn confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }
}

/// Stage-1 residuals diagnosed.
#[derive(Debug, Clone)]
pub struct Diagnosed {
    ctx: Arc<Context>,
    stage1: Arc<FittedModel>,
    report: Arc<ResidualReport>,
}

impl Diagnosed {
    pub fn stage1(&self) -> &FittedModel {
        &self.stage1
    }

    pub fn report(&self) -> &ResidualReport {
        &self.report
    }

    pub fn summary(&self) -> &ResidualSummary {
        &self.report.summary
    }

    /// Dataset row numbers of the flagged observations.
    pub fn extreme_rows(&self) -> Vec<usize> {
        let rows = self.ctx.sample.row_ids();
        self.report
            .extreme_indices()
            .into_iter()
            .map(|i| rows[i])
            .collect()
    }

    pub fn qq_points(&self) -> Result<Vec<QqPoint>, PipelineError> {
        qq_points(&self.stage1.result().residuals_vec()).map_err(self.ctx.fail(Stage::Diagnostics))
    }

    pub fn stage1_table(&self) -> CoefficientTable {
        CoefficientTable::new(&self.stage1, &self.ctx.schema)
    }

    /// Fit `resid ~ stage-2 controls + A*B`.
    pub fn fit_stage2(&self, options: &Stage2Options) -> Result<Stage2Fitted, PipelineError> {
        let ctx = &self.ctx;
        let fail = ctx.fail(Stage::Stage2);
        let level = validate_confidence_level(options.confidence_level).map_err(&fail)?;

        let with_resid = ctx
            .sample
            .with_column(
                RESIDUAL_COLUMN,
                SampleValues::Numeric(self.stage1.result().residuals_vec()),
            )
            .map_err(&fail)?;
        let (sample, n_excluded) = if options.exclude_extremes {
            let filtered = with_resid.filter(&self.report.keep_mask()).map_err(&fail)?;
            (filtered, self.report.summary.n_extreme)
        } else {
            (with_resid, 0)
        };

        let model = InteractionModelBuilder::new(
            ctx.safe(Stage::Stage2, &ctx.roles.factor_a)?,
            ctx.safe(Stage::Stage2, &ctx.roles.factor_b)?,
        )
        .controls(ctx.safe_all(Stage::Stage2, &ctx.roles.stage2_controls)?)
        .classifier(ctx.classifier)
        .build(&sample)
        .map_err(&fail)?;

        let engine = ctx.engine(Stage::Stage2, level)?;
        let fitted = model.fit(&sample, &engine).map_err(&fail)?;
        info!(
            "stage 2 fitted on {} rows ({} excluded)",
            sample.len(),
            n_excluded
        );
        Ok(Stage2Fitted {
            diagnosed: self.clone(),
            model,
            fitted,
            sample,
            n_excluded,
        })
    }
}

/// Stage-2 model available.
#[derive(Debug, Clone)]
pub struct Stage2Fitted {
    diagnosed: Diagnosed,
    model: InteractionModel,
    fitted: FittedModel,
    sample: AnalysisSample,
    n_excluded: usize,
}

impl Stage2Fitted {
    /// The diagnosed state this run started from, for another stage-2 run.
    pub fn diagnosed(&self) -> &Diagnosed {
        &self.diagnosed
    }

    pub fn model(&self) -> &InteractionModel {
        &self.model
    }

    pub fn stage2(&self) -> &FittedModel {
        &self.fitted
    }

    pub fn sample(&self) -> &AnalysisSample {
        &self.sample
    }

    pub fn n_excluded(&self) -> usize {
        self.n_excluded
    }

    pub fn coefficient_table(&self) -> CoefficientTable {
        CoefficientTable::new(&self.fitted, &self.diagnosed.ctx.schema)
    }

    /// Margins grid in internal naming.
    pub fn prediction_grid(&self, confidence_level: f64) -> Result<PredictionGrid, PipelineError> {
        let fail = self.diagnosed.ctx.fail(Stage::Margins);
        MarginsPredictor::new(confidence_level)
            .and_then(|p| p.predict(&self.model, &self.fitted, &self.sample))
            .map_err(fail)
    }

    /// Predicted means over the A × B grid at `confidence_level`.
    pub fn margins(&self, confidence_level: f64) -> Result<MarginsTable, PipelineError> {
        let grid = self.prediction_grid(confidence_level)?;
        Ok(MarginsTable::new(&grid, &self.diagnosed.ctx.schema))
    }
}
