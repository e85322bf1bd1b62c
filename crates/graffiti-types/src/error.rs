use thiserror::Error;

/// The closed error taxonomy shared by every Graffiti store.
///
/// Direct calls (`get`/`put`/`patch`/`delete`) return these immediately.
/// Streams surface per-entry faults as [`crate::StreamEntry::Error`] values
/// carrying one of these, and abort with one only on fatal faults.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraffitiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("patch error: {0}")]
    PatchError(String),

    #[error("patch test failed: {0}")]
    PatchTestFailed(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("unrecognized url scheme: {0}")]
    UnrecognizedUrlScheme(String),

    /// The server returned data that breaks the protocol contract. Always a
    /// server-side bug, never caller misuse.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be decoded (malformed body, missing header,
    /// empty stream).
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("unclassified error (status {status}): {message}")]
    Unclassified { status: u16, message: String },
}

impl GraffitiError {
    /// Short, stable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::Forbidden(_) => "Forbidden",
            Self::Unauthorized(_) => "Unauthorized",
            Self::InvalidSchema(_) => "InvalidSchema",
            Self::PatchError(_) => "PatchError",
            Self::PatchTestFailed(_) => "PatchTestFailed",
            Self::SchemaMismatch(_) => "SchemaMismatch",
            Self::UnrecognizedUrlScheme(_) => "UnrecognizedUrlScheme",
            Self::ProtocolViolation(_) => "ProtocolViolation",
            Self::Transport(_) => "Transport",
            Self::InvalidResponse(_) => "InvalidResponse",
            Self::Unclassified { .. } => "Unclassified",
        }
    }

    /// The human-readable message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(m)
            | Self::Forbidden(m)
            | Self::Unauthorized(m)
            | Self::InvalidSchema(m)
            | Self::PatchError(m)
            | Self::PatchTestFailed(m)
            | Self::SchemaMismatch(m)
            | Self::UnrecognizedUrlScheme(m)
            | Self::ProtocolViolation(m)
            | Self::Transport(m)
            | Self::InvalidResponse(m) => m,
            Self::Unclassified { message, .. } => message,
        }
    }
}

pub type GraffitiResult<T> = Result<T, GraffitiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_message() {
        let e = GraffitiError::PatchTestFailed("value mismatch".into());
        assert_eq!(e.kind(), "PatchTestFailed");
        assert_eq!(e.message(), "value mismatch");
        assert_eq!(e.to_string(), "patch test failed: value mismatch");
    }

    #[test]
    fn unclassified_carries_status() {
        let e = GraffitiError::Unclassified { status: 500, message: "boom".into() };
        assert_eq!(e.kind(), "Unclassified");
        assert_eq!(e.message(), "boom");
        assert!(e.to_string().contains("500"));
    }
}
