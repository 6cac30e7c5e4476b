//! Error Types
//!
//! Standardized error taxonomy shared by the nimbus use-case services.
//!
//! These are the boundary-level errors: an HTTP layer maps `NotFound` to 404,
//! `AccessDenied` to 403, `Validation` to 400 and `IllegalState` to 409.
//! Engine-internal errors (adapter failures, transition bugs) live in their
//! own crates and never surface here directly.

use serde::Serialize;
use thiserror::Error;

/// A single field-level validation failure.
///
/// Validation collects every violation before returning, so callers always
/// see the full list rather than the first failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// The field that failed validation.
    pub field: String,
    /// Description of the failure.
    pub message: String,
}

impl FieldViolation {
    /// Create a new violation.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Standardized error type for nimbus use-case operations.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NimbusError {
    /// Requested resource was not found.
    ///
    /// Returned before any ownership check, so callers cannot distinguish
    /// "never existed" from "deleted".
    #[error("{resource} not found{}", id.as_ref().map(|i| format!(": {i}")).unwrap_or_default())]
    NotFound {
        /// The type of resource (e.g. "AccountRequest").
        resource: String,
        /// Optional identifier of the resource.
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// The resource exists but is owned by a different requester.
    ///
    /// Only ever returned after existence is confirmed internally.
    #[error("Access denied to {resource}")]
    AccessDenied {
        /// The type of resource.
        resource: String,
    },

    /// The operation is not legal for the resource's current status.
    #[error("{message}")]
    IllegalState {
        /// Description, e.g. "Cannot delete resource in status READY".
        message: String,
    },

    /// Input validation failure with one or more field violations.
    #[error("Validation failed: {}", violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Validation {
        /// Every violation found, in field order.
        violations: Vec<FieldViolation>,
    },

    /// Unexpected internal failure (storage, bookkeeping).
    #[error("Internal error: {message}")]
    Internal {
        /// Description for the logs; not shown to end users verbatim.
        message: String,
    },
}

impl NimbusError {
    /// Create a `NotFound` error for a resource type and id.
    pub fn not_found(resource: impl Into<String>, id: impl ToString) -> Self {
        NimbusError::NotFound {
            resource: resource.into(),
            id: Some(id.to_string()),
        }
    }

    /// Create an `AccessDenied` error for a resource type.
    pub fn access_denied(resource: impl Into<String>) -> Self {
        NimbusError::AccessDenied {
            resource: resource.into(),
        }
    }

    /// Create an `IllegalState` error for a disallowed deletion.
    pub fn cannot_delete(status: impl std::fmt::Display) -> Self {
        NimbusError::IllegalState {
            message: format!("Cannot delete resource in status {status}"),
        }
    }

    /// Create an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        NimbusError::Internal {
            message: message.into(),
        }
    }
}

/// Type alias for Results using [`NimbusError`].
pub type Result<T> = std::result::Result<T, NimbusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let error = NimbusError::not_found("AccountRequest", "abc-123");
        assert_eq!(error.to_string(), "AccountRequest not found: abc-123");
    }

    #[test]
    fn test_not_found_without_id() {
        let error = NimbusError::NotFound {
            resource: "Environment".to_string(),
            id: None,
        };
        assert_eq!(error.to_string(), "Environment not found");
    }

    #[test]
    fn test_access_denied_display() {
        let error = NimbusError::access_denied("Environment");
        assert_eq!(error.to_string(), "Access denied to Environment");
    }

    #[test]
    fn test_cannot_delete_message() {
        let error = NimbusError::cannot_delete("READY");
        assert_eq!(error.to_string(), "Cannot delete resource in status READY");
    }

    #[test]
    fn test_validation_collects_all_violations() {
        let error = NimbusError::Validation {
            violations: vec![
                FieldViolation::new("accountName", "too short"),
                FieldViolation::new("email", "invalid"),
            ],
        };
        let display = error.to_string();
        assert!(display.contains("accountName: too short"));
        assert!(display.contains("email: invalid"));
    }

    #[test]
    fn test_serialization_tags_variant() {
        let error = NimbusError::not_found("AccountRequest", "x");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"type\":\"not_found\""));
        assert!(json.contains("\"resource\":\"AccountRequest\""));
    }

    #[test]
    fn test_question_mark_propagation() {
        fn inner() -> Result<()> {
            Err(NimbusError::access_denied("Environment"))
        }
        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }
        assert!(outer().is_err());
    }
}
