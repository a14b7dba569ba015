use serde::Serialize;
use thiserror::Error;

use crate::api::ApiError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Target not found: {0}")]
    TargetNotFound(String),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    /// True when the error was raised locally before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}

// Serialized as a plain message for JSON event output
impl Serialize for ClientError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_is_bare_message() {
        let err = ClientError::validation("Select a target first");
        assert_eq!(err.to_string(), "Select a target first");
        assert!(err.is_validation());
    }

    #[test]
    fn test_api_error_is_transparent() {
        let err: ClientError = ApiError::network(Some(500), "boom").into();
        assert_eq!(err.to_string(), "boom");
        assert!(!err.is_validation());
    }

    #[test]
    fn test_error_serializes_as_string() {
        let err = ClientError::TargetNotFound("db1".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Target not found: db1\"");
    }
}
