//! Adapter error types
//!
//! Error definitions with transient/permanent classification for retry logic.
//! The reconciliation engine retries transient errors with bounded backoff and
//! turns permanent ones into resource failure states immediately.

use thiserror::Error;

/// Error that can occur while talking to an external backend.
#[derive(Debug, Error)]
pub enum AdapterError {
    // Connection errors (transient)
    /// Failed to establish connection to the backend.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Request timed out.
    #[error("request timeout after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Backend is temporarily unavailable (throttling, maintenance).
    #[error("backend unavailable: {message}")]
    BackendUnavailable { message: String },

    // Protocol errors (permanent)
    /// Backend returned a response that could not be interpreted.
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    /// Credentials were rejected by the backend.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The request itself was rejected as invalid.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Serialization of a claim spec or payload failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AdapterError {
    /// Check if this error is transient and the call should be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdapterError::ConnectionFailed { .. }
                | AdapterError::Timeout { .. }
                | AdapterError::BackendUnavailable { .. }
        )
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get an error code for classification and logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            AdapterError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            AdapterError::Timeout { .. } => "TIMEOUT",
            AdapterError::BackendUnavailable { .. } => "BACKEND_UNAVAILABLE",
            AdapterError::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            AdapterError::AuthenticationFailed => "AUTH_FAILED",
            AdapterError::InvalidRequest { .. } => "INVALID_REQUEST",
            AdapterError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        AdapterError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AdapterError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a backend unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        AdapterError::BackendUnavailable {
            message: message.into(),
        }
    }

    /// Create a malformed response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        AdapterError::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        AdapterError::InvalidRequest {
            message: message.into(),
        }
    }
}

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;
