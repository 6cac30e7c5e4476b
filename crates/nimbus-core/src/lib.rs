//! nimbus Core Library
//!
//! Shared types for the nimbus provisioning platform.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (`RequesterId`, `AccountRequestId`, ...)
//!   and the validated [`ids::AwsAccountId`] newtype
//! - [`error`] - Standardized error types ([`NimbusError`])

pub mod error;
pub mod ids;

// Re-export main types for convenient access
pub use error::{FieldViolation, NimbusError, Result};
pub use ids::{
    AccountRefId, AccountRequestId, AwsAccountId, EnvironmentId, ParseIdError, RequesterId, TeamId,
};
