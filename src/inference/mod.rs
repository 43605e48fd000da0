//! Statistical inference (standard errors, p-values, confidence intervals).

mod cluster_covariance;
mod coefficient;
mod prediction;
mod robust_covariance;

pub use cluster_covariance::cluster_robust_covariance;
pub use coefficient::{classical_covariance, CoefficientInference};
pub use prediction::{compute_mean_intervals, PredictionResult};
pub use robust_covariance::hc1_covariance;
