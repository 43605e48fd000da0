//! Design-matrix construction from a structured [`Formula`].
//!
//! The layout is derived once from the estimation sample and then reused to
//! encode any further row (e.g. a prediction grid), so categorical levels
//! always map to the same indicator columns.
//!
//! Categorical variables use treatment coding: the lowest observed level is
//! the reference and every other level gets an indicator. Interactions
//! contribute both main effects followed by all pairwise products of their
//! columns.

use crate::core::{
    AnalysisError, AnalysisSample, CoefficientLabel, Formula, LabelPart, Level, SampleValues,
    Term, VariableKind,
};
use faer::Mat;

#[derive(Debug, Clone)]
enum Block {
    Continuous { variable: String },
    Categorical { variable: String, levels: Vec<Level> },
}

impl Block {
    fn variable(&self) -> &str {
        match self {
            Self::Continuous { variable } | Self::Categorical { variable, .. } => variable,
        }
    }
}

/// Value of a block for one row: a number, or the index of a level.
#[derive(Debug, Clone, Copy)]
enum BlockValue {
    Number(f64),
    Index(usize),
}

#[derive(Debug, Clone)]
struct DesignColumn {
    label: CoefficientLabel,
    /// (block, level) factors multiplied together; `None` means the raw value.
    parts: Vec<(usize, Option<usize>)>,
}

/// Column structure of a design matrix. Column 0 is always the intercept.
#[derive(Debug, Clone)]
pub struct DesignLayout {
    blocks: Vec<Block>,
    columns: Vec<DesignColumn>,
}

impl DesignLayout {
    pub fn from_formula(formula: &Formula, sample: &AnalysisSample) -> Result<Self, AnalysisError> {
        let mut layout = Self {
            blocks: Vec::new(),
            columns: vec![DesignColumn {
                label: CoefficientLabel::Intercept,
                parts: Vec::new(),
            }],
        };

        for term in formula.terms() {
            match term {
                Term::Continuous(v) => {
                    let b = layout.add_block(v, VariableKind::Continuous, sample)?;
                    let cols = layout.main_columns(b);
                    layout.columns.extend(cols);
                }
                Term::Categorical(v) => {
                    let b = layout.add_block(v, VariableKind::Categorical, sample)?;
                    let cols = layout.main_columns(b);
                    layout.columns.extend(cols);
                }
                Term::Interaction(a, b) => {
                    let block_a = layout.add_block(&a.variable, a.kind, sample)?;
                    let block_b = layout.add_block(&b.variable, b.kind, sample)?;
                    let cols_a = layout.main_columns(block_a);
                    let cols_b = layout.main_columns(block_b);
                    let mut products = Vec::with_capacity(cols_a.len() * cols_b.len());
                    for col_b in &cols_b {
                        for col_a in &cols_a {
                            products.push(product(col_a, col_b));
                        }
                    }
                    layout.columns.extend(cols_a);
                    layout.columns.extend(cols_b);
                    layout.columns.extend(products);
                }
            }
        }
        Ok(layout)
    }

    fn add_block(
        &mut self,
        variable: &str,
        kind: VariableKind,
        sample: &AnalysisSample,
    ) -> Result<usize, AnalysisError> {
        let values = sample.values(variable)?;
        let block = match (kind, values) {
            (VariableKind::Continuous, SampleValues::Text(_)) => {
                return Err(AnalysisError::NonNumeric {
                    variable: variable.to_string(),
                })
            }
            (VariableKind::Continuous, SampleValues::Numeric(_)) => Block::Continuous {
                variable: variable.to_string(),
            },
            (VariableKind::Categorical, _) => Block::Categorical {
                variable: variable.to_string(),
                levels: values.levels(),
            },
        };
        self.blocks.push(block);
        Ok(self.blocks.len() - 1)
    }

    fn main_columns(&self, b: usize) -> Vec<DesignColumn> {
        match &self.blocks[b] {
            Block::Continuous { variable } => vec![DesignColumn {
                label: CoefficientLabel::Effect(vec![LabelPart {
                    variable: variable.clone(),
                    level: None,
                }]),
                parts: vec![(b, None)],
            }],
            Block::Categorical { variable, levels } => levels
                .iter()
                .enumerate()
                .skip(1)
                .map(|(k, level)| DesignColumn {
                    label: CoefficientLabel::Effect(vec![LabelPart {
                        variable: variable.clone(),
                        level: Some(level.clone()),
                    }]),
                    parts: vec![(b, Some(k))],
                })
                .collect(),
        }
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn labels(&self) -> Vec<CoefficientLabel> {
        self.columns.iter().map(|c| c.label.clone()).collect()
    }

    pub fn label(&self, j: usize) -> Option<&CoefficientLabel> {
        self.columns.get(j).map(|c| &c.label)
    }

    /// Variables the design reads, in block order.
    pub fn variables(&self) -> Vec<&str> {
        self.blocks.iter().map(Block::variable).collect()
    }

    /// Encode one row; `value` supplies each variable's value.
    pub fn encode_row(
        &self,
        value: impl Fn(&str) -> Option<Level>,
    ) -> Result<Vec<f64>, AnalysisError> {
        let mut block_values = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let variable = block.variable();
            let level = value(variable).ok_or_else(|| AnalysisError::UndefinedVariable {
                variable: variable.to_string(),
            })?;
            let v = match block {
                Block::Continuous { .. } => BlockValue::Number(level.as_f64().ok_or_else(
                    || AnalysisError::NonNumeric {
                        variable: variable.to_string(),
                    },
                )?),
                Block::Categorical { levels, .. } => {
                    BlockValue::Index(levels.binary_search(&level).map_err(|_| {
                        AnalysisError::InvalidParameter(format!(
                            "level `{}` of `{}` was not observed in the estimation sample",
                            level, variable
                        ))
                    })?)
                }
            };
            block_values.push(v);
        }

        Ok(self
            .columns
            .iter()
            .map(|col| {
                col.parts
                    .iter()
                    .map(|&(b, level)| match (level, block_values[b]) {
                        (Some(k), BlockValue::Index(i)) => {
                            if k == i {
                                1.0
                            } else {
                                0.0
                            }
                        }
                        (_, BlockValue::Number(x)) => x,
                        (None, BlockValue::Index(_)) => 1.0,
                    })
                    .product::<f64>()
            })
            .collect())
    }

    /// Design matrix over every row of `sample`.
    pub fn build(&self, sample: &AnalysisSample) -> Result<Mat<f64>, AnalysisError> {
        let sources = self
            .blocks
            .iter()
            .map(|b| sample.values(b.variable()).map(|v| (b.variable(), v)))
            .collect::<Result<Vec<_>, _>>()?;

        let n = sample.len();
        let p = self.n_columns();
        let mut x: Mat<f64> = Mat::zeros(n, p);
        for i in 0..n {
            let row = self.encode_row(|variable| {
                sources
                    .iter()
                    .find(|(name, _)| *name == variable)
                    .map(|(_, values)| values.level(i))
            })?;
            for (j, value) in row.into_iter().enumerate() {
                x[(i, j)] = value;
            }
        }
        Ok(x)
    }
}

fn product(a: &DesignColumn, b: &DesignColumn) -> DesignColumn {
    let parts_of = |label: &CoefficientLabel| match label {
        CoefficientLabel::Intercept => Vec::new(),
        CoefficientLabel::Effect(parts) => parts.clone(),
    };
    let mut label_parts = parts_of(&a.label);
    label_parts.extend(parts_of(&b.label));
    let mut parts = a.parts.clone();
    parts.extend(b.parts.iter().copied());
    DesignColumn {
        label: CoefficientLabel::Effect(label_parts),
        parts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, Dataset, Factor, FormulaBuilder, VariableSanitizer};

    fn sample() -> AnalysisSample {
        let dataset = Dataset::new(vec![
            Column::from_f64("y", [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            Column::from_f64("x", [0.5, 1.5, 2.5, 3.5, 4.5, 5.5]),
            Column::from_strs("g", ["b", "a", "c", "a", "b", "c"]),
            Column::from_f64("h", [0.0, 1.0, 0.0, 1.0, 0.0, 1.0]),
        ])
        .unwrap();
        let schema = VariableSanitizer::default().sanitize(["y", "x", "g", "h"]);
        AnalysisSample::from_dataset(&dataset, &schema).unwrap()
    }

    #[test]
    fn test_treatment_coding_labels() {
        let formula = FormulaBuilder::new("v_0")
            .control("v_1", VariableKind::Continuous)
            .fixed_effect("v_2")
            .build()
            .unwrap();
        let layout = DesignLayout::from_formula(&formula, &sample()).unwrap();
        let labels: Vec<String> = layout.labels().iter().map(|l| l.to_string()).collect();
        assert_eq!(
            labels,
            vec!["Intercept", "v_1", "C(v_2)[T.b]", "C(v_2)[T.c]"]
        );
    }

    #[test]
    fn test_interaction_expands_to_main_effects_and_product() {
        let formula = FormulaBuilder::new("v_0")
            .interaction(
                Factor::new("v_2", VariableKind::Categorical),
                Factor::new("v_3", VariableKind::Categorical),
            )
            .build()
            .unwrap();
        let s = sample();
        let layout = DesignLayout::from_formula(&formula, &s).unwrap();
        let labels: Vec<String> = layout.labels().iter().map(|l| l.to_string()).collect();
        assert_eq!(
            labels,
            vec![
                "Intercept",
                "C(v_2)[T.b]",
                "C(v_2)[T.c]",
                "C(v_3)[T.1]",
                "C(v_2)[T.b]:C(v_3)[T.1]",
                "C(v_2)[T.c]:C(v_3)[T.1]",
            ]
        );

        let x = layout.build(&s).unwrap();
        assert_eq!(x.nrows(), 6);
        // Row 1: g = a (reference), h = 1
        assert_eq!(x[(1, 0)], 1.0);
        assert_eq!(x[(1, 1)], 0.0);
        assert_eq!(x[(1, 3)], 1.0);
        assert_eq!(x[(1, 4)], 0.0);
        // Row 5: g = c, h = 1
        assert_eq!(x[(5, 2)], 1.0);
        assert_eq!(x[(5, 5)], 1.0);
    }

    #[test]
    fn test_continuous_by_categorical_product() {
        let formula = FormulaBuilder::new("v_0")
            .interaction(
                Factor::new("v_1", VariableKind::Continuous),
                Factor::new("v_3", VariableKind::Categorical),
            )
            .build()
            .unwrap();
        let s = sample();
        let layout = DesignLayout::from_formula(&formula, &s).unwrap();
        let x = layout.build(&s).unwrap();
        assert_eq!(layout.n_columns(), 4);
        assert_eq!(x[(3, 3)], 3.5);
        assert_eq!(x[(2, 3)], 0.0);
    }

    #[test]
    fn test_text_as_continuous_rejected() {
        let formula = FormulaBuilder::new("v_0")
            .control("v_2", VariableKind::Continuous)
            .build()
            .unwrap();
        let err = DesignLayout::from_formula(&formula, &sample()).unwrap_err();
        assert!(matches!(err, AnalysisError::NonNumeric { .. }));
    }

    #[test]
    fn test_unseen_level_rejected_on_encode() {
        let formula = FormulaBuilder::new("v_0").fixed_effect("v_2").build().unwrap();
        let layout = DesignLayout::from_formula(&formula, &sample()).unwrap();
        let err = layout
            .encode_row(|_| Some(Level::from("zzz")))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter(_)));
        let row = layout.encode_row(|_| Some(Level::from("c"))).unwrap();
        assert_eq!(row, vec![1.0, 0.0, 1.0]);
    }
}
