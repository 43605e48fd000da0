//! Persisted variable selections.
//!
//! The payload is a flat JSON object. Loading validates each key against the
//! columns of the dataset at hand and applies only the keys that pass, so a
//! configuration saved for one file can be partially reused on another.

use crate::core::error::AnalysisError;
use crate::core::options::{CovarianceMode, RoleAssignment};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Stored in `cluster_var` when no cluster variable is selected.
pub const CLUSTER_NONE_SENTINEL: &str = "none selected";

/// Keys of the configuration payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    DepVar,
    ControlVars,
    FeVars,
    VceMode,
    ClusterVar,
    InteractVar1,
    InteractVar2,
    Stage2Controls,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 8] = [
        Self::DepVar,
        Self::ControlVars,
        Self::FeVars,
        Self::VceMode,
        Self::ClusterVar,
        Self::InteractVar1,
        Self::InteractVar2,
        Self::Stage2Controls,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DepVar => "dep_var",
            Self::ControlVars => "control_vars",
            Self::FeVars => "fe_vars",
            Self::VceMode => "vce_mode",
            Self::ClusterVar => "cluster_var",
            Self::InteractVar1 => "interact_var1",
            Self::InteractVar2 => "interact_var2",
            Self::Stage2Controls => "stage2_controls",
        }
    }

    fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key that was present in the payload but not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedKey {
    pub key: ConfigKey,
    pub reason: String,
}

/// Outcome of loading a payload against a dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigLoad {
    /// Values of the accepted keys; every other field is left at its default.
    pub values: AnalysisConfig,
    pub accepted: Vec<ConfigKey>,
    pub rejected: Vec<RejectedKey>,
}

/// The variable selections of one analysis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub dep_var: Option<String>,
    pub control_vars: Vec<String>,
    pub fe_vars: Vec<String>,
    pub vce_mode: CovarianceMode,
    #[serde(with = "cluster_sentinel")]
    pub cluster_var: Option<String>,
    pub interact_var1: Option<String>,
    pub interact_var2: Option<String>,
    pub stage2_controls: Vec<String>,
}

impl AnalysisConfig {
    pub fn to_json(&self) -> Result<String, AnalysisError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AnalysisError::Export(e.to_string()))
    }

    /// Validate `text` key by key against `columns`.
    ///
    /// Fails only if `text` is not a JSON object; individual bad keys end up
    /// in [`ConfigLoad::rejected`].
    pub fn load_json(text: &str, columns: &[String]) -> Result<ConfigLoad, AnalysisError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| AnalysisError::InvalidParameter(format!("configuration payload: {}", e)))?;
        let Value::Object(map) = value else {
            return Err(AnalysisError::InvalidParameter(
                "configuration payload must be a JSON object".to_string(),
            ));
        };

        let mut load = ConfigLoad::default();
        for (name, value) in &map {
            let Some(key) = ConfigKey::parse(name) else {
                debug!("ignoring unknown configuration key `{}`", name);
                continue;
            };
            match load.values.set_checked(key, value, columns) {
                Ok(()) => load.accepted.push(key),
                Err(reason) => {
                    debug!("rejecting configuration key `{}`: {}", key, reason);
                    load.rejected.push(RejectedKey { key, reason });
                }
            }
        }
        Ok(load)
    }

    /// Overwrite the keys a load accepted, leaving the rest untouched.
    pub fn apply(&mut self, load: &ConfigLoad) {
        for key in &load.accepted {
            let v = &load.values;
            match key {
                ConfigKey::DepVar => self.dep_var = v.dep_var.clone(),
                ConfigKey::ControlVars => self.control_vars = v.control_vars.clone(),
                ConfigKey::FeVars => self.fe_vars = v.fe_vars.clone(),
                ConfigKey::VceMode => self.vce_mode = v.vce_mode,
                ConfigKey::ClusterVar => self.cluster_var = v.cluster_var.clone(),
                ConfigKey::InteractVar1 => self.interact_var1 = v.interact_var1.clone(),
                ConfigKey::InteractVar2 => self.interact_var2 = v.interact_var2.clone(),
                ConfigKey::Stage2Controls => self.stage2_controls = v.stage2_controls.clone(),
            }
        }
    }

    /// Turn a complete configuration into role assignments.
    pub fn resolve(&self) -> Result<RoleAssignment, AnalysisError> {
        let required = |value: &Option<String>, key: ConfigKey| {
            value
                .clone()
                .ok_or_else(|| AnalysisError::IncompleteConfiguration {
                    key: key.as_str().to_string(),
                })
        };
        Ok(RoleAssignment {
            outcome: required(&self.dep_var, ConfigKey::DepVar)?,
            controls: self.control_vars.clone(),
            fixed_effects: self.fe_vars.clone(),
            covariance: self.vce_mode,
            cluster: self.cluster_var.clone(),
            factor_a: required(&self.interact_var1, ConfigKey::InteractVar1)?,
            factor_b: required(&self.interact_var2, ConfigKey::InteractVar2)?,
            stage2_controls: self.stage2_controls.clone(),
        })
    }

    fn set_checked(&mut self, key: ConfigKey, value: &Value, columns: &[String]) -> Result<(), String> {
        match key {
            ConfigKey::DepVar => self.dep_var = Some(column_name(value, columns)?),
            ConfigKey::InteractVar1 => self.interact_var1 = Some(column_name(value, columns)?),
            ConfigKey::InteractVar2 => self.interact_var2 = Some(column_name(value, columns)?),
            ConfigKey::ControlVars => self.control_vars = column_list(value, columns)?,
            ConfigKey::FeVars => self.fe_vars = column_list(value, columns)?,
            ConfigKey::Stage2Controls => self.stage2_controls = column_list(value, columns)?,
            ConfigKey::VceMode => {
                self.vce_mode = CovarianceMode::deserialize(value)
                    .map_err(|_| format!("unknown covariance mode {}", value))?
            }
            ConfigKey::ClusterVar => {
                self.cluster_var = match value.as_str() {
                    Some(CLUSTER_NONE_SENTINEL) => None,
                    _ => Some(column_name(value, columns)?),
                }
            }
        }
        Ok(())
    }
}

impl From<&RoleAssignment> for AnalysisConfig {
    fn from(roles: &RoleAssignment) -> Self {
        Self {
            dep_var: Some(roles.outcome.clone()),
            control_vars: roles.controls.clone(),
            fe_vars: roles.fixed_effects.clone(),
            vce_mode: roles.covariance,
            cluster_var: roles.cluster.clone(),
            interact_var1: Some(roles.factor_a.clone()),
            interact_var2: Some(roles.factor_b.clone()),
            stage2_controls: roles.stage2_controls.clone(),
        }
    }
}

fn column_name(value: &Value, columns: &[String]) -> Result<String, String> {
    let name = value
        .as_str()
        .ok_or_else(|| format!("expected a column name, found {}", value))?;
    if columns.iter().any(|c| c == name) {
        Ok(name.to_string())
    } else {
        Err(format!("`{}` is not a column of the dataset", name))
    }
}

fn column_list(value: &Value, columns: &[String]) -> Result<Vec<String>, String> {
    let items = value
        .as_array()
        .ok_or_else(|| format!("expected a list of column names, found {}", value))?;
    items.iter().map(|v| column_name(v, columns)).collect()
}

mod cluster_sentinel {
    use super::CLUSTER_NONE_SENTINEL;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.as_deref().unwrap_or(CLUSTER_NONE_SENTINEL))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let name = Option::<String>::deserialize(d)?;
        Ok(name.filter(|n| n != CLUSTER_NONE_SENTINEL))
    }
}
