//! Stage-2 model: stage-1 residuals on a full two-factor interaction.

use crate::core::{
    AnalysisError, AnalysisSample, CategoricalClassifier, Factor, Formula, FormulaBuilder,
    VariableKind, RESIDUAL_COLUMN,
};
use crate::solvers::{FittedModel, OlsEngine};
use log::debug;

/// Builds the `resid ~ controls + A*B` specification.
///
/// The two factors are classified on the sample the model is fit on (so on
/// the filtered sample when extremes are excluded). Extra controls are typed
/// by storage only: text columns expand to indicators, numeric columns enter
/// linearly.
#[derive(Debug, Clone)]
pub struct InteractionModelBuilder {
    factor_a: String,
    factor_b: String,
    controls: Vec<String>,
    classifier: CategoricalClassifier,
}

impl InteractionModelBuilder {
    pub fn new(factor_a: impl Into<String>, factor_b: impl Into<String>) -> Self {
        Self {
            factor_a: factor_a.into(),
            factor_b: factor_b.into(),
            controls: Vec::new(),
            classifier: CategoricalClassifier::default(),
        }
    }

    pub fn classifier(mut self, classifier: CategoricalClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn control(mut self, variable: impl Into<String>) -> Self {
        self.controls.push(variable.into());
        self
    }

    pub fn controls<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.controls.extend(variables.into_iter().map(Into::into));
        self
    }

    /// Classify every variable on `sample` and assemble the formula.
    pub fn build(&self, sample: &AnalysisSample) -> Result<InteractionModel, AnalysisError> {
        let factor_a = Factor::new(
            self.factor_a.clone(),
            self.classifier.classify(sample.values(&self.factor_a)?),
        );
        let factor_b = Factor::new(
            self.factor_b.clone(),
            self.classifier.classify(sample.values(&self.factor_b)?),
        );

        let mut builder = FormulaBuilder::new(RESIDUAL_COLUMN);
        let mut controls = Vec::with_capacity(self.controls.len());
        for variable in &self.controls {
            let kind = VariableKind::from_column_type(sample.values(variable)?.column_type());
            builder = builder.control(variable.clone(), kind);
            controls.push(Factor::new(variable.clone(), kind));
        }
        let formula = builder
            .interaction(factor_a.clone(), factor_b.clone())
            .build()?;

        debug!(
            "stage-2 factors: {} is {:?}, {} is {:?}",
            factor_a.variable, factor_a.kind, factor_b.variable, factor_b.kind
        );
        Ok(InteractionModel {
            formula,
            factor_a,
            factor_b,
            controls,
        })
    }
}

/// A classified stage-2 specification, ready to fit.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionModel {
    formula: Formula,
    factor_a: Factor,
    factor_b: Factor,
    controls: Vec<Factor>,
}

impl InteractionModel {
    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn factor_a(&self) -> &Factor {
        &self.factor_a
    }

    pub fn factor_b(&self) -> &Factor {
        &self.factor_b
    }

    pub fn controls(&self) -> &[Factor] {
        &self.controls
    }

    /// Continuous factors, which rule out margins over a level grid.
    pub fn continuous_factors(&self) -> Vec<String> {
        [&self.factor_a, &self.factor_b]
            .into_iter()
            .filter(|f| f.kind == VariableKind::Continuous)
            .map(|f| f.variable.clone())
            .collect()
    }

    pub fn fit(
        &self,
        sample: &AnalysisSample,
        engine: &OlsEngine,
    ) -> Result<FittedModel, AnalysisError> {
        engine.fit(&self.formula, sample)
    }
}
