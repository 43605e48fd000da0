//! Predictive margins over the observed levels of two categorical factors.

use crate::analysis::interaction::InteractionModel;
use crate::core::sample::mean;
use crate::core::{
    validate_confidence_level, AnalysisError, AnalysisSample, Level, SampleValues,
    DEFAULT_MARGINS_LEVEL,
};
use crate::solvers::FittedModel;
use faer::Mat;
use log::debug;

/// Value a control is held at across the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct HeldValue {
    pub variable: String,
    pub value: Level,
}

/// Prediction for one A × B cell.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRow {
    /// Level of the first factor
    pub level_a: Level,
    /// Level of the second factor
    pub level_b: Level,
    /// Predicted mean `x'β`
    pub mean: f64,
    /// Standard error `sqrt(x'Vx)` of the predicted mean
    pub se: f64,
    /// Lower confidence bound
    pub lower: f64,
    /// Upper confidence bound
    pub upper: f64,
}

/// Predicted means on the A × B level grid, ordered by A then B.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionGrid {
    pub factor_a: String,
    pub factor_b: String,
    pub held: Vec<HeldValue>,
    pub confidence_level: f64,
    pub rows: Vec<GridRow>,
}

/// Computes margins from a fitted stage-2 model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginsPredictor {
    confidence_level: f64,
}

impl Default for MarginsPredictor {
    fn default() -> Self {
        Self {
            confidence_level: DEFAULT_MARGINS_LEVEL,
        }
    }
}

impl MarginsPredictor {
    pub fn new(confidence_level: f64) -> Result<Self, AnalysisError> {
        Ok(Self {
            confidence_level: validate_confidence_level(confidence_level)?,
        })
    }

    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    /// Predict the mean outcome at every combination of observed levels.
    ///
    /// `sample` must be the sample `fitted` was estimated on. Numeric
    /// controls are held at their mean, text controls at their most frequent
    /// level.
    pub fn predict(
        &self,
        model: &InteractionModel,
        fitted: &FittedModel,
        sample: &AnalysisSample,
    ) -> Result<PredictionGrid, AnalysisError> {
        let continuous = model.continuous_factors();
        if !continuous.is_empty() {
            return Err(AnalysisError::UnsupportedMarginsConfiguration { continuous });
        }

        let a = &model.factor_a().variable;
        let b = &model.factor_b().variable;
        let levels_a = sample.values(a)?.levels();
        let levels_b = sample.values(b)?.levels();

        let held = model
            .controls()
            .iter()
            .map(|c| held_value(&c.variable, sample.values(&c.variable)?))
            .collect::<Result<Vec<_>, _>>()?;

        let layout = fitted.layout();
        let combos: Vec<(&Level, &Level)> = levels_a
            .iter()
            .flat_map(|la| levels_b.iter().map(move |lb| (la, lb)))
            .collect();
        let mut x_new: Mat<f64> = Mat::zeros(combos.len(), layout.n_columns());
        for (i, (la, lb)) in combos.iter().enumerate() {
            let encoded = layout.encode_row(|variable| {
                if variable == a {
                    Some((*la).clone())
                } else if variable == b {
                    Some((*lb).clone())
                } else {
                    held.iter()
                        .find(|h| h.variable == variable)
                        .map(|h| h.value.clone())
                }
            })?;
            for (j, value) in encoded.into_iter().enumerate() {
                x_new[(i, j)] = value;
            }
        }

        let pred = fitted.predict_mean(&x_new, self.confidence_level)?;
        let rows = combos
            .into_iter()
            .enumerate()
            .map(|(i, (la, lb))| GridRow {
                level_a: la.clone(),
                level_b: lb.clone(),
                mean: pred.fit[i],
                se: pred.se[i],
                lower: pred.lower[i],
                upper: pred.upper[i],
            })
            .collect::<Vec<_>>();

        debug!(
            "margins: {} x {} grid at level {}",
            levels_a.len(),
            levels_b.len(),
            self.confidence_level
        );
        Ok(PredictionGrid {
            factor_a: a.clone(),
            factor_b: b.clone(),
            held,
            confidence_level: self.confidence_level,
            rows,
        })
    }
}

fn held_value(variable: &str, values: &SampleValues) -> Result<HeldValue, AnalysisError> {
    let value = match values {
        SampleValues::Numeric(v) => Level::number(mean(v)),
        SampleValues::Text(_) => values.mode().ok_or_else(|| {
            AnalysisError::InvalidParameter(format!("control `{}` has no observations", variable))
        })?,
    };
    Ok(HeldValue {
        variable: variable.to_string(),
        value,
    })
}
