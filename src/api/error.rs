//! HTTP mapping of [`ServiceError`].

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

use super::types::ErrorResponse;
use crate::error::ServiceError;
use crate::model::ModelError;

/// Status code reported for `err`.
///
/// Request mistakes map to 4xx: unknown ids and artifacts to 404, bad
/// parameters to 400, state conflicts and the session cap to 409, and
/// artifacts that lack a required variable or are malformed to 422.
/// Runtime and I/O failures map to 500.
pub fn status_of(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::SessionNotFound(_) | ServiceError::ArtifactNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        ServiceError::UnknownProfile(_) | ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ServiceError::SessionLimit(_) | ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Model(m) => match m {
            ModelError::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                StatusCode::NOT_FOUND
            }
            ModelError::Parse(_)
            | ModelError::Invalid(_)
            | ModelError::UnknownKind(_)
            | ModelError::UnknownVariable(_)
            | ModelError::UnknownValueReference(_)
            | ModelError::NotSettable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ModelError::InvalidStepSize(_) | ModelError::StepTooLarge { .. } => {
                StatusCode::BAD_REQUEST
            }
            ModelError::Read { .. }
            | ModelError::Extract { .. }
            | ModelError::Lifecycle { .. }
            | ModelError::TimeMismatch { .. }
            | ModelError::Diverged { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        },
        ServiceError::Config(_) | ServiceError::Io(_) | ServiceError::Task(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = status_of(&self);
        let message = self.to_string();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "request failed");
        } else {
            debug!(status = status.as_u16(), error = %message, "request rejected");
        }
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn client_errors_are_4xx() {
        let cases = [
            (ServiceError::SessionNotFound("a".into()), 404),
            (ServiceError::ArtifactNotFound("a".into()), 404),
            (ServiceError::InvalidInput("bad".into()), 400),
            (ServiceError::UnknownProfile("p".into()), 400),
            (ServiceError::SessionLimit(4), 409),
            (ServiceError::Conflict("busy".into()), 409),
            (ServiceError::Model(ModelError::UnknownVariable("x".into())), 422),
            (ServiceError::Model(ModelError::Parse("eof".into())), 422),
        ];
        for (err, code) in cases {
            assert_eq!(status_of(&err).as_u16(), code, "{err}");
        }
    }

    #[test]
    fn runtime_and_io_errors_are_500() {
        let diverged = ServiceError::Model(ModelError::Diverged { time: 1.0 });
        assert_eq!(status_of(&diverged), StatusCode::INTERNAL_SERVER_ERROR);
        let io = ServiceError::Io(io::Error::other("disk full"));
        assert_eq!(status_of(&io), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_artifact_file_is_404() {
        let err = ServiceError::Model(ModelError::Read {
            path: PathBuf::from("artifacts/Gone.model.toml"),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
        assert_eq!(status_of(&err), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn body_carries_error_message() {
        let resp = ServiceError::SessionNotFound("abc".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("body");
        let body: ErrorResponse = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body.error, "session \"abc\" not found");
    }
}
