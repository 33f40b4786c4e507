use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("Failed to connect to image generation service")]
    ServiceUnavailableError(#[source] TransportError),
    #[error("Protocol error: {0}")]
    ProtocolError(String),
    #[error("Generation failed: {0}")]
    GenerationFailedError(String),
    #[error("Image generation timed out")]
    TimeoutError,
}

impl GenerationError {
    /// Errors caused by the caller's input rather than the service.
    pub fn is_user_error(&self) -> bool {
        matches!(self, GenerationError::ValidationError(_))
    }
}

/// Failures below the protocol level: the request never produced a usable
/// 2xx response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Status(status.as_u16())
        } else if e.is_body() || e.is_decode() {
            TransportError::Body(e.to_string())
        } else {
            TransportError::Connection(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;
pub type TransportResult<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = GenerationError::GenerationFailedError("content filtered".into());
        assert_eq!(err.to_string(), "Generation failed: content filtered");

        let err = GenerationError::ServiceUnavailableError(TransportError::Status(503));
        assert_eq!(
            err.to_string(),
            "Failed to connect to image generation service"
        );
        assert!(std::error::Error::source(&err).is_some());

        assert_eq!(
            GenerationError::TimeoutError.to_string(),
            "Image generation timed out"
        );
    }

    #[test]
    fn test_user_error_classification() {
        assert!(GenerationError::ValidationError("short".into()).is_user_error());
        assert!(!GenerationError::TimeoutError.is_user_error());
        assert!(!GenerationError::ProtocolError("x".into()).is_user_error());
    }
}
