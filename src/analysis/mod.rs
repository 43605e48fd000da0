//! The two-stage analysis: residual interaction model, margins, the
//! pipeline state machine and export tables.

mod export;
mod interaction;
mod margins;
mod pipeline;

pub use export::{CoefficientRow, CoefficientTable, HeldControl, MarginsRow, MarginsTable};
pub use interaction::{InteractionModel, InteractionModelBuilder};
pub use margins::{GridRow, HeldValue, MarginsPredictor, PredictionGrid};
pub use pipeline::{
    DataLoaded, Diagnosed, Pipeline, PipelineError, Stage, Stage1Fitted, Stage2Fitted,
    Stage2Options,
};
