//! Account factory contract
//!
//! Two-call polling contract wrapping any external account-creation backend.
//! Creation is asynchronous on the backend side: `create` returns a receipt
//! immediately and the caller polls `describe_status` until a terminal state
//! is reported.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use nimbus_core::AwsAccountId;

use crate::error::AdapterResult;

/// Receipt returned by [`AccountFactory::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryReceipt {
    /// Opaque backend-assigned identifier used for subsequent status polls.
    pub request_id: String,
}

/// Backend-reported state of an account creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactoryState {
    /// Creation is still running; poll again later.
    InProgress,
    /// The account exists; `account_id` is populated.
    Succeeded,
    /// Creation failed permanently; `failure_reason` is populated.
    Failed,
}

impl FactoryState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FactoryState::InProgress => "IN_PROGRESS",
            FactoryState::Succeeded => "SUCCEEDED",
            FactoryState::Failed => "FAILED",
        }
    }
}

/// Status report returned by [`AccountFactory::describe_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryStatusReport {
    /// The request id this report describes.
    pub request_id: String,
    /// Current backend state.
    pub state: FactoryState,
    /// The created account's id, present once state is `Succeeded`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AwsAccountId>,
    /// Failure reason, present when state is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl FactoryStatusReport {
    /// Report for a request still in progress.
    pub fn in_progress(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            state: FactoryState::InProgress,
            account_id: None,
            failure_reason: None,
        }
    }

    /// Report for a successfully created account.
    pub fn succeeded(request_id: impl Into<String>, account_id: AwsAccountId) -> Self {
        Self {
            request_id: request_id.into(),
            state: FactoryState::Succeeded,
            account_id: Some(account_id),
            failure_reason: None,
        }
    }

    /// Report for a permanently failed request.
    pub fn failed(request_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            state: FactoryState::Failed,
            account_id: None,
            failure_reason: Some(reason.into()),
        }
    }
}

/// Contract for an external account-creation backend.
///
/// Implementations must make `describe_status` idempotent: re-invoking it any
/// number of times changes no external side effects and only reports the
/// current state. An unknown `request_id` is reported as `Failed` with reason
/// `not_found` rather than raised as an error; the reconciliation engine
/// treats unknown ids as permanent failures, not retryable ones.
#[async_trait]
pub trait AccountFactory: Send + Sync {
    /// Submit an account creation request to the backend.
    async fn create(&self, name: &str, email: &str) -> AdapterResult<FactoryReceipt>;

    /// Report the current state of a previously submitted request.
    async fn describe_status(&self, request_id: &str) -> AdapterResult<FactoryStatusReport>;
}
