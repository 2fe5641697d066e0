//! Service-level error type shared by the session registry, batch runs,
//! the real-time runner and the HTTP layer.

use crate::model::ModelError;

/// Every failure the service reports to a caller.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("session \"{0}\" not found")]
    SessionNotFound(String),

    #[error("session limit of {0} reached")]
    SessionLimit(usize),

    #[error("unknown session profile \"{0}\"")]
    UnknownProfile(String),

    #[error("artifact \"{0}\" not found")]
    ArtifactNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
