//! Error types for Gatehouse
//!
//! Configuration problems are fatal at construction. Everything that can go
//! wrong while serving a request is folded into a `Decision` by the engine,
//! so these errors only reach the HTTP layer from plumbing code.

use hyper::StatusCode;

/// Main error type for Gatehouse operations
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not implemented: {0}")]
    Unimplemented(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unimplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Token(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error must stop the gate from serving traffic
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for GateError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Token(format!("JWT error: {}", err))
    }
}

/// Result type alias for Gatehouse operations
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            GateError::Config("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GateError::Unimplemented("password".into()).status_code(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            GateError::Token("bad".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_only_config_errors_are_fatal() {
        assert!(GateError::Config("unknown protocol".into()).is_fatal());
        assert!(!GateError::Internal("rng".into()).is_fatal());
        assert!(!GateError::Unimplemented("password".into()).is_fatal());
    }

    #[test]
    fn test_json_error_becomes_config_error() {
        let err: GateError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, GateError::Config(_)));
    }
}
