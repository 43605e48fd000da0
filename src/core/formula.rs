//! Structured linear-model specifications.
//!
//! A [`Formula`] is an outcome plus an ordered list of [`Term`]s. It is never
//! parsed from text; the string form exists only for display.

use crate::core::classify::VariableKind;
use crate::core::data::Level;
use crate::core::error::AnalysisError;
use serde::Serialize;
use std::fmt;

/// One side of an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Factor {
    pub variable: String,
    pub kind: VariableKind,
}

impl Factor {
    pub fn new(variable: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            variable: variable.into(),
            kind,
        }
    }

    fn render(&self, name: &impl Fn(&str) -> String) -> String {
        match self.kind {
            VariableKind::Categorical => format!("C({})", name(&self.variable)),
            VariableKind::Continuous => name(&self.variable),
        }
    }
}

/// A right-hand-side term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Term {
    /// The variable enters as a single regressor.
    Continuous(String),
    /// One indicator per non-reference level.
    Categorical(String),
    /// Full interaction `A*B`, expanding to `A + B + A:B`.
    Interaction(Factor, Factor),
}

impl Term {
    /// A main-effect term of the given kind.
    pub fn main(variable: impl Into<String>, kind: VariableKind) -> Self {
        match kind {
            VariableKind::Categorical => Self::Categorical(variable.into()),
            VariableKind::Continuous => Self::Continuous(variable.into()),
        }
    }

    pub fn variables(&self) -> Vec<&str> {
        match self {
            Self::Continuous(v) | Self::Categorical(v) => vec![v.as_str()],
            Self::Interaction(a, b) => vec![a.variable.as_str(), b.variable.as_str()],
        }
    }

    fn render(&self, name: &impl Fn(&str) -> String) -> String {
        match self {
            Self::Continuous(v) => name(v),
            Self::Categorical(v) => format!("C({})", name(v)),
            Self::Interaction(a, b) => format!("{}*{}", a.render(name), b.render(name)),
        }
    }
}

/// An outcome regressed on an intercept and an ordered list of terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Formula {
    outcome: String,
    terms: Vec<Term>,
}

impl Formula {
    pub fn outcome(&self) -> &str {
        &self.outcome
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Text form with every identifier passed through `name`.
    pub fn render(&self, name: impl Fn(&str) -> String) -> String {
        let rhs = if self.terms.is_empty() {
            "1".to_string()
        } else {
            self.terms
                .iter()
                .map(|t| t.render(&name))
                .collect::<Vec<_>>()
                .join(" + ")
        };
        format!("{} ~ {}", name(&self.outcome), rhs)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(|s| s.to_string()))
    }
}

/// Assembles a [`Formula`] from variable roles.
///
/// Terms come out as controls, then fixed effects, then the interaction,
/// each group in the order supplied. A variable used twice is an error.
#[derive(Debug, Clone, Default)]
pub struct FormulaBuilder {
    outcome: String,
    controls: Vec<(String, VariableKind)>,
    fixed_effects: Vec<String>,
    interaction: Option<(Factor, Factor)>,
}

impl FormulaBuilder {
    pub fn new(outcome: impl Into<String>) -> Self {
        Self {
            outcome: outcome.into(),
            ..Default::default()
        }
    }

    /// Additive control; categorical controls expand to indicators.
    pub fn control(mut self, variable: impl Into<String>, kind: VariableKind) -> Self {
        self.controls.push((variable.into(), kind));
        self
    }

    /// Fixed effect, always expanded as a categorical main effect.
    pub fn fixed_effect(mut self, variable: impl Into<String>) -> Self {
        self.fixed_effects.push(variable.into());
        self
    }

    pub fn interaction(mut self, a: Factor, b: Factor) -> Self {
        self.interaction = Some((a, b));
        self
    }

    pub fn build(self) -> Result<Formula, AnalysisError> {
        let mut uses: Vec<(&str, &str)> = vec![(self.outcome.as_str(), "outcome")];
        uses.extend(self.controls.iter().map(|(v, _)| (v.as_str(), "control")));
        uses.extend(
            self.fixed_effects
                .iter()
                .map(|v| (v.as_str(), "fixed effect")),
        );
        if let Some((a, b)) = &self.interaction {
            uses.push((a.variable.as_str(), "interaction factor"));
            uses.push((b.variable.as_str(), "interaction factor"));
        }
        for (i, (variable, _)) in uses.iter().enumerate() {
            if uses[..i].iter().any(|(v, _)| v == variable) {
                let roles = uses
                    .iter()
                    .filter(|(v, _)| v == variable)
                    .map(|(_, r)| r.to_string())
                    .collect();
                return Err(AnalysisError::DuplicateVariable {
                    variable: variable.to_string(),
                    roles,
                });
            }
        }

        let mut terms: Vec<Term> = self
            .controls
            .into_iter()
            .map(|(v, kind)| Term::main(v, kind))
            .collect();
        terms.extend(self.fixed_effects.into_iter().map(Term::Categorical));
        if let Some((a, b)) = self.interaction {
            terms.push(Term::Interaction(a, b));
        }
        Ok(Formula {
            outcome: self.outcome,
            terms,
        })
    }
}

/// One factor of a coefficient label: a variable, and for indicator
/// columns the level the indicator switches on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelPart {
    pub variable: String,
    pub level: Option<Level>,
}

/// Name of one design-matrix column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CoefficientLabel {
    Intercept,
    Effect(Vec<LabelPart>),
}

impl CoefficientLabel {
    /// Patsy-style text: `x`, `C(g)[T.b]`, parts joined by `:`.
    pub fn render(&self, name: impl Fn(&str) -> String) -> String {
        match self {
            Self::Intercept => "Intercept".to_string(),
            Self::Effect(parts) => parts
                .iter()
                .map(|p| match &p.level {
                    Some(level) => format!("C({})[T.{}]", name(&p.variable), level),
                    None => name(&p.variable),
                })
                .collect::<Vec<_>>()
                .join(":"),
        }
    }

    pub fn map_names(&self, name: impl Fn(&str) -> String) -> Self {
        match self {
            Self::Intercept => Self::Intercept,
            Self::Effect(parts) => Self::Effect(
                parts
                    .iter()
                    .map(|p| LabelPart {
                        variable: name(&p.variable),
                        level: p.level.clone(),
                    })
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for CoefficientLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(|s| s.to_string()))
    }
}
