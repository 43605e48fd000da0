//! The analysis sample: dataset rows complete on every referenced variable.

use crate::core::data::{ColumnData, ColumnType, Dataset, Level};
use crate::core::error::AnalysisError;
use crate::core::schema::VariableSchema;
use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Fully observed values of one sample column.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValues {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl SampleValues {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Numeric(_) => ColumnType::Numeric,
            Self::Text(_) => ColumnType::Text,
        }
    }

    pub fn level(&self, i: usize) -> Level {
        match self {
            Self::Numeric(v) => Level::number(v[i]),
            Self::Text(v) => Level::Text(v[i].clone()),
        }
    }

    /// Distinct observed values in ascending natural order.
    pub fn levels(&self) -> Vec<Level> {
        let mut levels: Vec<Level> = (0..self.len()).map(|i| self.level(i)).collect();
        levels.sort();
        levels.dedup();
        levels
    }

    /// Most frequent value; ties resolve to the lowest level.
    pub fn mode(&self) -> Option<Level> {
        let mut counts: BTreeMap<Level, usize> = BTreeMap::new();
        for i in 0..self.len() {
            *counts.entry(self.level(i)).or_insert(0) += 1;
        }
        let mut best: Option<(Level, usize)> = None;
        for (level, count) in counts {
            if best.as_ref().map_or(true, |(_, c)| count > *c) {
                best = Some((level, count));
            }
        }
        best.map(|(level, _)| level)
    }

    fn select(&self, keep: &[bool]) -> Self {
        match self {
            Self::Numeric(v) => Self::Numeric(
                v.iter()
                    .zip(keep)
                    .filter(|(_, k)| **k)
                    .map(|(&x, _)| x)
                    .collect(),
            ),
            Self::Text(v) => Self::Text(
                v.iter()
                    .zip(keep)
                    .filter(|(_, k)| **k)
                    .map(|(s, _)| s.clone())
                    .collect(),
            ),
        }
    }
}

/// Descriptive statistics of one sample column, in original naming.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColumnSummary {
    Numeric {
        name: String,
        count: usize,
        mean: f64,
        std_dev: f64,
        min: f64,
        q25: f64,
        median: f64,
        q75: f64,
        max: f64,
    },
    Text {
        name: String,
        count: usize,
        n_levels: usize,
        mode: Option<String>,
    },
}

/// Rows of a [`Dataset`] with no missing value in any referenced variable,
/// keyed by safe identifiers.
#[derive(Debug, Clone)]
pub struct AnalysisSample {
    n_raw: usize,
    row_ids: Vec<usize>,
    names: Vec<String>,
    columns: Vec<SampleValues>,
    index: HashMap<String, usize>,
}

impl AnalysisSample {
    /// Listwise deletion over the schema's variables.
    pub fn from_dataset(dataset: &Dataset, schema: &VariableSchema) -> Result<Self, AnalysisError> {
        let mut sources = Vec::with_capacity(schema.len());
        for entry in schema.entries() {
            let column = dataset
                .column(&entry.original)
                .ok_or_else(|| AnalysisError::UndefinedVariable {
                    variable: entry.original.clone(),
                })?;
            sources.push((entry.safe.clone(), column.data()));
        }

        let row_ids: Vec<usize> = (0..dataset.n_rows())
            .filter(|&i| sources.iter().all(|(_, data)| !data.is_missing(i)))
            .collect();

        let mut sample = Self {
            n_raw: dataset.n_rows(),
            row_ids: Vec::new(),
            names: Vec::new(),
            columns: Vec::new(),
            index: HashMap::new(),
        };
        for (safe, data) in sources {
            let values = match data {
                ColumnData::Numeric(v) => {
                    SampleValues::Numeric(row_ids.iter().filter_map(|&i| v[i]).collect())
                }
                ColumnData::Text(v) => {
                    SampleValues::Text(row_ids.iter().filter_map(|&i| v[i].clone()).collect())
                }
            };
            sample.push(safe, values);
        }
        sample.row_ids = row_ids;

        info!(
            "analysis sample: {} of {} rows retained ({} dropped for missing values)",
            sample.len(),
            sample.n_raw,
            sample.n_dropped()
        );
        Ok(sample)
    }

    fn push(&mut self, name: String, values: SampleValues) {
        self.index.insert(name.clone(), self.columns.len());
        self.names.push(name);
        self.columns.push(values);
    }

    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }

    /// Row count of the dataset the sample was drawn from.
    pub fn n_raw(&self) -> usize {
        self.n_raw
    }

    pub fn n_dropped(&self) -> usize {
        self.n_raw - self.len()
    }

    /// Positions of the retained rows in the source dataset.
    pub fn row_ids(&self) -> &[usize] {
        &self.row_ids
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn values(&self, name: &str) -> Result<&SampleValues, AnalysisError> {
        self.index
            .get(name)
            .map(|&i| &self.columns[i])
            .ok_or_else(|| AnalysisError::UndefinedVariable {
                variable: name.to_string(),
            })
    }

    pub fn numeric(&self, name: &str) -> Result<&[f64], AnalysisError> {
        match self.values(name)? {
            SampleValues::Numeric(v) => Ok(v),
            SampleValues::Text(_) => Err(AnalysisError::NonNumeric {
                variable: name.to_string(),
            }),
        }
    }

    /// A copy of the sample with one more column.
    pub fn with_column(
        &self,
        name: impl Into<String>,
        values: SampleValues,
    ) -> Result<Self, AnalysisError> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(AnalysisError::InvalidParameter(format!(
                "column `{}` has {} values for a sample of {} rows",
                name,
                values.len(),
                self.len()
            )));
        }
        let mut sample = self.clone();
        match sample.index.get(&name) {
            Some(&i) => sample.columns[i] = values,
            None => sample.push(name, values),
        }
        Ok(sample)
    }

    /// Rows where `keep` is true. The source row count is preserved.
    pub fn filter(&self, keep: &[bool]) -> Result<Self, AnalysisError> {
        if keep.len() != self.len() {
            return Err(AnalysisError::InvalidParameter(format!(
                "row mask has {} entries for a sample of {} rows",
                keep.len(),
                self.len()
            )));
        }
        let sample = Self {
            n_raw: self.n_raw,
            row_ids: self
                .row_ids
                .iter()
                .zip(keep)
                .filter(|(_, k)| **k)
                .map(|(&r, _)| r)
                .collect(),
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.select(keep)).collect(),
            index: self.index.clone(),
        };
        debug!("filtered sample from {} to {} rows", self.len(), sample.len());
        Ok(sample)
    }

    /// Per-column descriptive statistics.
    pub fn describe(&self, schema: &VariableSchema) -> Vec<ColumnSummary> {
        self.names
            .iter()
            .zip(&self.columns)
            .map(|(safe, values)| {
                let name = schema.display_name(safe).to_string();
                match values {
                    SampleValues::Numeric(v) => describe_numeric(name, v),
                    SampleValues::Text(_) => ColumnSummary::Text {
                        name,
                        count: values.len(),
                        n_levels: values.levels().len(),
                        mode: values.mode().map(|l| l.to_string()),
                    },
                }
            })
            .collect()
    }
}

fn describe_numeric(name: String, v: &[f64]) -> ColumnSummary {
    let n = v.len();
    let mean = mean(v);
    let std_dev = sample_std(v, mean);
    let mut sorted = v.to_vec();
    sorted.sort_by(f64::total_cmp);
    ColumnSummary::Numeric {
        name,
        count: n,
        mean,
        std_dev,
        min: sorted.first().copied().unwrap_or(f64::NAN),
        q25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max: sorted.last().copied().unwrap_or(f64::NAN),
    }
}

pub(crate) fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        return f64::NAN;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

/// Standard deviation with the `n - 1` denominator.
pub(crate) fn sample_std(v: &[f64], mean: f64) -> f64 {
    if v.len() < 2 {
        return f64::NAN;
    }
    let ss: f64 = v.iter().map(|x| (x - mean).powi(2)).sum();
    (ss / (v.len() - 1) as f64).sqrt()
}

/// Linear-interpolation quantile of sorted data.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}
