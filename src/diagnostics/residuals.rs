//! Residual summary and extreme-value flagging.
//!
//! A residual is extreme when `|e_i| > k · s`, where `s` is the sample
//! standard deviation (n − 1 denominator) of the full residual vector. The
//! threshold is computed once over the unfiltered residuals and never
//! re-derived after exclusions.

use crate::core::sample::{mean, sample_std};
use crate::core::{AnalysisError, FitFailure, DEFAULT_EXTREME_MULTIPLE};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

/// One residual and whether it lies beyond the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResidualRecord {
    /// Position in the estimation sample.
    pub index: usize,
    pub residual: f64,
    pub extreme: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResidualSummary {
    pub n: usize,
    pub mean: f64,
    pub std_dev: f64,
    /// Dispersion multiple `k`.
    pub multiple: f64,
    /// `k · std_dev`
    pub threshold: f64,
    pub n_extreme: usize,
    pub proportion_extreme: f64,
    pub min: f64,
    pub max: f64,
}

impl ResidualSummary {
    pub fn to_json(&self) -> Result<String, AnalysisError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AnalysisError::Export(e.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct ResidualReport {
    pub records: Vec<ResidualRecord>,
    pub summary: ResidualSummary,
}

impl ResidualReport {
    /// `true` for rows kept when extremes are excluded.
    pub fn keep_mask(&self) -> Vec<bool> {
        self.records.iter().map(|r| !r.extreme).collect()
    }

    pub fn extreme_indices(&self) -> Vec<usize> {
        self.records
            .iter()
            .filter(|r| r.extreme)
            .map(|r| r.index)
            .collect()
    }
}

/// A point of a normal Q-Q plot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QqPoint {
    pub theoretical: f64,
    pub sample: f64,
}

/// Flags residuals beyond `k` standard deviations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualDiagnostics {
    multiple: f64,
}

impl Default for ResidualDiagnostics {
    fn default() -> Self {
        Self {
            multiple: DEFAULT_EXTREME_MULTIPLE,
        }
    }
}

impl ResidualDiagnostics {
    pub fn new(multiple: f64) -> Result<Self, AnalysisError> {
        if !(multiple.is_finite() && multiple > 0.0) {
            return Err(AnalysisError::InvalidParameter(format!(
                "dispersion multiple must be positive and finite, got {}",
                multiple
            )));
        }
        Ok(Self { multiple })
    }

    pub fn multiple(&self) -> f64 {
        self.multiple
    }

    pub fn diagnose(&self, residuals: &[f64]) -> Result<ResidualReport, AnalysisError> {
        if residuals.is_empty() {
            return Err(AnalysisError::InvalidParameter(
                "no residuals to diagnose".to_string(),
            ));
        }
        let n = residuals.len();
        let m = mean(residuals);
        let std_dev = sample_std(residuals, m);
        let threshold = self.multiple * std_dev;

        let records: Vec<ResidualRecord> = residuals
            .iter()
            .enumerate()
            .map(|(index, &residual)| ResidualRecord {
                index,
                residual,
                extreme: residual.abs() > threshold,
            })
            .collect();
        let n_extreme = records.iter().filter(|r| r.extreme).count();

        Ok(ResidualReport {
            records,
            summary: ResidualSummary {
                n,
                mean: m,
                std_dev,
                multiple: self.multiple,
                threshold,
                n_extreme,
                proportion_extreme: n_extreme as f64 / n as f64,
                min: residuals.iter().copied().fold(f64::INFINITY, f64::min),
                max: residuals.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            },
        })
    }
}

/// Ordered residuals against standard normal quantiles.
///
/// Plotting positions follow Filliben (1975):
/// `m_n = 0.5^(1/n)`, `m_1 = 1 - m_n`, `m_i = (i - 0.3175) / (n + 0.365)`.
pub fn qq_points(residuals: &[f64]) -> Result<Vec<QqPoint>, AnalysisError> {
    let normal = Normal::new(0.0, 1.0).map_err(|e| FitFailure::Numerical(e.to_string()))?;
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let nf = n as f64;
    let m_n = 0.5_f64.powf(1.0 / nf);
    Ok(sorted
        .into_iter()
        .enumerate()
        .map(|(i, sample)| {
            let position = if i + 1 == n {
                m_n
            } else if i == 0 {
                1.0 - m_n
            } else {
                (i as f64 + 1.0 - 0.3175) / (nf + 0.365)
            };
            QqPoint {
                theoretical: normal.inverse_cdf(position),
                sample,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn residuals() -> Vec<f64> {
        let mut r: Vec<f64> = (0..40).map(|i| ((i * 37) % 11) as f64 / 10.0 - 0.5).collect();
        r.push(25.0);
        r
    }

    #[test]
    fn test_outlier_is_flagged() {
        let report = ResidualDiagnostics::default().diagnose(&residuals()).unwrap();
        assert_eq!(report.summary.n_extreme, 1);
        assert_eq!(report.extreme_indices(), vec![40]);
        assert!(!report.keep_mask()[40]);
        assert_relative_eq!(
            report.summary.threshold,
            3.0 * report.summary.std_dev,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_flag_count_monotone_in_multiple() {
        let r = residuals();
        let counts: Vec<usize> = [0.5, 1.0, 2.0, 3.0, 6.0]
            .iter()
            .map(|&k| ResidualDiagnostics::new(k).unwrap().diagnose(&r).unwrap().summary.n_extreme)
            .collect();
        assert!(counts.windows(2).all(|w| w[0] >= w[1]), "{:?}", counts);
    }

    #[test]
    fn test_flags_match_rule() {
        let r = residuals();
        let report = ResidualDiagnostics::new(1.0).unwrap().diagnose(&r).unwrap();
        let expected = r
            .iter()
            .filter(|e| e.abs() > report.summary.std_dev)
            .count();
        assert_eq!(report.summary.n_extreme, expected);
        assert_relative_eq!(
            report.summary.proportion_extreme,
            expected as f64 / r.len() as f64
        );
    }

    #[test]
    fn test_invalid_multiple() {
        assert!(ResidualDiagnostics::new(0.0).is_err());
        assert!(ResidualDiagnostics::new(-1.0).is_err());
        assert!(ResidualDiagnostics::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_empty_residuals() {
        assert!(ResidualDiagnostics::default().diagnose(&[]).is_err());
    }

    #[test]
    fn test_qq_points_symmetric() {
        let points = qq_points(&[3.0, -1.0, 0.0, 1.0, -3.0]).unwrap();
        assert_eq!(points.len(), 5);
        assert_eq!(points[0].sample, -3.0);
        assert_relative_eq!(points[2].theoretical, 0.0, epsilon = 1e-9);
        assert_relative_eq!(points[0].theoretical, -points[4].theoretical, epsilon = 1e-9);
    }

    #[test]
    fn test_summary_json() {
        let report = ResidualDiagnostics::default().diagnose(&[1.0, -1.0, 0.5]).unwrap();
        let json = report.summary.to_json().unwrap();
        assert!(json.contains("\"n_extreme\": 0"));
    }
}
