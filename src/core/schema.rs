//! Mapping between user-facing column names and formula-safe identifiers.
//!
//! Column names in survey data routinely contain spaces, punctuation or
//! non-Latin scripts. Every referenced name gets a synthesized identifier
//! (`v_0`, `v_1`, ...) that is valid in any term label, together with the
//! inverse mapping used when results are displayed.

use crate::core::options::RoleAssignment;
use std::collections::HashMap;
use std::fmt;

/// Internal identifier of the stage-1 residual column.
///
/// Never produced by [`VariableSanitizer`], whose identifiers always carry
/// the sanitizer prefix.
pub const RESIDUAL_COLUMN: &str = "resid";

/// The part a variable plays in the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Stage-1 dependent variable
    Outcome,
    /// Stage-1 control
    Control,
    /// Stage-1 fixed effect, always entered as indicators
    FixedEffect,
    /// First interaction factor
    FactorA,
    /// Second interaction factor
    FactorB,
    /// Control entering the stage-2 model only
    Stage2Control,
    /// Grouping variable for cluster-robust covariance
    ClusterKey,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Outcome => "outcome",
            Self::Control => "control",
            Self::FixedEffect => "fixed effect",
            Self::FactorA => "factor A",
            Self::FactorB => "factor B",
            Self::Stage2Control => "stage-2 control",
            Self::ClusterKey => "cluster key",
        };
        f.write_str(s)
    }
}

/// One referenced variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableEntry {
    pub original: String,
    pub safe: String,
    pub roles: Vec<Role>,
}

/// Bijection between original names and safe identifiers.
#[derive(Debug, Clone, Default)]
pub struct VariableSchema {
    entries: Vec<VariableEntry>,
    by_original: HashMap<String, usize>,
    by_safe: HashMap<String, usize>,
}

impl VariableSchema {
    /// Build the schema for every variable a role assignment references.
    ///
    /// The cluster key is only part of the schema when cluster-robust
    /// covariance is selected.
    pub fn from_roles(roles: &RoleAssignment) -> Self {
        let mut schema = VariableSanitizer::default().sanitize(roles.referenced().map(|(n, _)| n));
        for (name, role) in roles.referenced() {
            if let Some(&idx) = schema.by_original.get(name) {
                let entry = &mut schema.entries[idx];
                if !entry.roles.contains(&role) {
                    entry.roles.push(role);
                }
            }
        }
        schema
    }

    pub fn entries(&self) -> &[VariableEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn safe_name(&self, original: &str) -> Option<&str> {
        self.by_original
            .get(original)
            .map(|&i| self.entries[i].safe.as_str())
    }

    pub fn original_name(&self, safe: &str) -> Option<&str> {
        self.by_safe
            .get(safe)
            .map(|&i| self.entries[i].original.as_str())
    }

    /// Original name for `safe`, or `safe` itself for internal columns.
    pub fn display_name<'a>(&'a self, safe: &'a str) -> &'a str {
        self.original_name(safe).unwrap_or(safe)
    }

    pub fn roles(&self, original: &str) -> &[Role] {
        self.by_original
            .get(original)
            .map_or(&[], |&i| self.entries[i].roles.as_slice())
    }
}

/// Prefix of every synthesized identifier.
const SAFE_PREFIX: &str = "v_";

/// Synthesizes identifiers from positions, never from the names themselves,
/// so construction cannot fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariableSanitizer;

impl VariableSanitizer {
    /// Map every distinct name, in first-appearance order.
    pub fn sanitize<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> VariableSchema {
        let mut schema = VariableSchema::default();
        for name in names {
            if schema.by_original.contains_key(name) {
                continue;
            }
            let idx = schema.entries.len();
            let safe = format!("{SAFE_PREFIX}{idx}");
            schema.by_original.insert(name.to_string(), idx);
            schema.by_safe.insert(safe.clone(), idx);
            schema.entries.push(VariableEntry {
                original: name.to_string(),
                safe,
                roles: Vec::new(),
            });
        }
        schema
    }
}
