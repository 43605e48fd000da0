//! Design-matrix construction and the least-squares engine.

pub(crate) mod cholesky;
mod design;
mod ols;

pub use design::DesignLayout;
pub use ols::{FittedModel, OlsEngine, OlsEngineBuilder};
