//! Use-case services
//!
//! The boundary this crate exposes to the (out-of-scope) HTTP layer: submit,
//! get, list and cancel per resource kind, plus the operational verbs on
//! environments. Ownership and validation errors are resolved here and never
//! reach the state machine.
//!
//! Access rule: existence is checked before ownership, so a requester probing
//! another user's resource id gets `AccessDenied` only for resources that
//! exist, and `NotFound` otherwise.

pub mod account_refs;
pub mod account_requests;
pub mod environments;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nimbus_core::{AwsAccountId, RequesterId, TeamId};

use crate::model::{BudgetGuardrails, EnvironmentSize};

pub use account_refs::AccountRefService;
pub use account_requests::AccountRequestService;
pub use environments::EnvironmentService;

/// Input for submitting an account request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAccountRequestInput {
    /// The submitting user.
    pub requester_id: RequesterId,
    /// Desired account display name (3-100 chars).
    pub account_name: String,
    /// Root email for the new account.
    pub owner_email: String,
    /// Free-text purpose.
    pub purpose: String,
    /// Primary region; must be in the allow-list.
    pub region: String,
    /// Optional budget guardrail bundle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetGuardrails>,
    /// Optional expiry; strictly future, at most 90 days out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Input for submitting an environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitEnvironmentInput {
    /// Owning team.
    pub team_id: TeamId,
    /// The creating user.
    pub creator_id: RequesterId,
    /// Display name (3-100 chars).
    pub name: String,
    /// Template identifier.
    pub template_id: String,
    /// Template version; must be a semantic version.
    pub template_version: String,
    /// The AWS account to deploy into.
    pub account_id: AwsAccountId,
    /// Instance size class.
    pub size: EnvironmentSize,
    /// Deployment region; must be in the allow-list.
    pub region: String,
    /// Whether autoscaling is enabled.
    pub enable_auto_scaling: bool,
    /// Minimum instance count; required when autoscaling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_instances: Option<u32>,
    /// Maximum instance count; required when autoscaling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_instances: Option<u32>,
    /// Optional expiry; strictly future.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether monitoring is provisioned.
    pub enable_monitoring: bool,
    /// Whether backups are provisioned.
    pub enable_backups: bool,
}

/// Input for linking a pre-existing AWS account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkAccountInput {
    /// The linking user, who becomes the owner.
    pub owner_id: RequesterId,
    /// The external 12-digit account number.
    pub account_id: AwsAccountId,
    /// Display name (3-100 chars).
    pub display_name: String,
    /// Cross-account role ARN; its embedded account id must match.
    pub role_arn: String,
    /// Email receiving alerts.
    pub owner_email: String,
}
