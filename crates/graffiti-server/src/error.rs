use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use graffiti_types::GraffitiError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Graffiti(#[from] GraffitiError),

    #[error("{0}")]
    BadRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Graffiti(e) => match e {
                GraffitiError::NotFound(_) => StatusCode::NOT_FOUND,
                GraffitiError::Forbidden(_) => StatusCode::FORBIDDEN,
                GraffitiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                GraffitiError::InvalidSchema(_) | GraffitiError::PatchError(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                GraffitiError::PatchTestFailed(_) | GraffitiError::SchemaMismatch(_) => {
                    StatusCode::PRECONDITION_FAILED
                }
                GraffitiError::UnrecognizedUrlScheme(_) | GraffitiError::InvalidResponse(_) => {
                    StatusCode::BAD_REQUEST
                }
                GraffitiError::Unclassified { status, .. } => StatusCode::from_u16(*status)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                GraffitiError::ProtocolViolation(_) | GraffitiError::Transport(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::BadRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `message` sent to clients. Kinds the client tells apart by prefix
    /// carry their kind name in front.
    pub fn message(&self) -> String {
        match self {
            Self::Graffiti(
                e @ (GraffitiError::InvalidSchema(_)
                | GraffitiError::PatchError(_)
                | GraffitiError::PatchTestFailed(_)
                | GraffitiError::SchemaMismatch(_)),
            ) => format!("{}: {}", e.kind(), e.message()),
            Self::Graffiti(e) => e.message().to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(%status, error = %self, "request failed");
        }
        (status, Json(json!({ "message": self.message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graffiti_protocol::classify;

    #[test]
    fn statuses() {
        let cases = [
            (GraffitiError::NotFound("x".into()), 404),
            (GraffitiError::Forbidden("x".into()), 403),
            (GraffitiError::Unauthorized("x".into()), 401),
            (GraffitiError::InvalidSchema("x".into()), 422),
            (GraffitiError::PatchError("x".into()), 422),
            (GraffitiError::PatchTestFailed("x".into()), 412),
            (GraffitiError::SchemaMismatch("x".into()), 412),
        ];
        for (error, code) in cases {
            assert_eq!(ServerError::from(error).status().as_u16(), code);
        }
        assert_eq!(ServerError::BadRequest("x".into()).status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn messages_survive_classification() {
        for error in [
            GraffitiError::NotFound("no object".into()),
            GraffitiError::PatchError("bad op".into()),
            GraffitiError::InvalidSchema("bad schema".into()),
            GraffitiError::PatchTestFailed("test".into()),
            GraffitiError::SchemaMismatch("mismatch".into()),
        ] {
            let server = ServerError::from(error.clone());
            let classified = classify(server.status(), &json!({"message": server.message()}).to_string());
            assert_eq!(classified.map(|e| e.kind()), Some(error.kind()));
        }
    }
}
