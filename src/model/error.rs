//! Error type for artifact loading and model execution.

use std::path::PathBuf;

/// Failures raised while reading artifacts or driving a simulation instance.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read artifact {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to extract artifact into {path}")]
    Extract {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid model description: {0}")]
    Parse(String),

    #[error("invalid model description: {0}")]
    Invalid(String),

    #[error("unsupported model kind \"{0}\"")]
    UnknownKind(String),

    #[error("variable \"{0}\" not found in model description")]
    UnknownVariable(String),

    #[error("unknown value reference {0}")]
    UnknownValueReference(u32),

    #[error("variable \"{name}\" cannot be set ({causality})")]
    NotSettable { name: String, causality: String },

    #[error("{operation} not allowed in state {state}")]
    Lifecycle {
        operation: &'static str,
        state: &'static str,
    },

    #[error("communication point {requested} does not match instance time {current}")]
    TimeMismatch { requested: f64, current: f64 },

    #[error("step size must be positive and finite, got {0}")]
    InvalidStepSize(f64),

    #[error("step size {step} exceeds the model limit of {max}")]
    StepTooLarge { step: f64, max: f64 },

    #[error("simulation diverged at t = {time}")]
    Diverged { time: f64 },
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
