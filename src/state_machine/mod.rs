mod pipeline;
mod records;
mod stage;

pub use pipeline::{DEFAULT_MARKER, Pipeline, Transition};
pub use records::{
    DataVersion, EvaluationMetrics, ModelVersion, Prediction, PredictionClass, StatusKind,
    StatusMessage,
};
pub use stage::{Stage, State, Variant};
