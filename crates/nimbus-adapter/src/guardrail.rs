//! Guardrail controller contract
//!
//! Wraps an external declarative policy controller (typically a Kubernetes
//! operator). The caller files a *claim* describing the guardrail bundle for
//! an account; the controller drives real-world state toward the claim and
//! exposes progress through a condition list on the claim object.
//!
//! The controller's native condition vocabulary is mapped to a three-state
//! outcome by the pure function [`to_guardrail_status`], keeping the
//! reconciliation engine independent of controller specifics.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nimbus_core::AwsAccountId;

use crate::error::AdapterResult;

/// Declarative guardrail request for one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailClaimSpec {
    /// The account the guardrails apply to.
    pub account_id: AwsAccountId,
    /// Display name of the account.
    pub account_name: String,
    /// Cross-account role ARN the controller assumes.
    pub role_arn: String,
    /// Email receiving budget and compliance alerts.
    pub owner_email: String,
    /// Opaque guardrail parameters (budget bundle, allowed regions, flags).
    pub parameters: serde_json::Value,
}

/// One condition reported on a claim object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimCondition {
    /// Condition type, e.g. "Ready" or "Synced".
    #[serde(rename = "type")]
    pub condition_type: String,
    /// Condition status: "True", "False" or "Unknown".
    pub status: String,
    /// Machine-readable reason, present on failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human-readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ClaimCondition {
    /// A satisfied condition of the given type.
    pub fn satisfied(condition_type: impl Into<String>) -> Self {
        Self {
            condition_type: condition_type.into(),
            status: "True".to_string(),
            reason: None,
            message: None,
        }
    }

    /// A failed condition with a reason and message.
    pub fn failed(
        condition_type: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            condition_type: condition_type.into(),
            status: "False".to_string(),
            reason: Some(reason.into()),
            message: Some(message.into()),
        }
    }
}

/// Observed state of a claim, as returned by [`GuardrailController::get_claim`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSnapshot {
    /// Controller-assigned claim name.
    pub name: String,
    /// The spec the claim was created with.
    pub spec: GuardrailClaimSpec,
    /// Current condition list.
    pub conditions: Vec<ClaimCondition>,
    /// When the claim was created on the controller.
    pub created_at: DateTime<Utc>,
}

/// Three-state outcome derived from a claim's conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailStatus {
    /// The controller is still converging.
    Pending,
    /// All guardrails are applied.
    Applied,
    /// The controller gave up; carries the failure text.
    Failed { message: String },
}

/// Map a claim snapshot to its three-state outcome.
///
/// A `Ready` condition with status `True` implies applied. Any condition
/// carrying a failure reason implies failed. Otherwise the claim is pending.
#[must_use]
pub fn to_guardrail_status(claim: &ClaimSnapshot) -> GuardrailStatus {
    if claim
        .conditions
        .iter()
        .any(|c| c.condition_type == "Ready" && c.status == "True")
    {
        return GuardrailStatus::Applied;
    }

    if let Some(failed) = claim.conditions.iter().find(|c| c.reason.is_some()) {
        let reason = failed.reason.as_deref().unwrap_or("unknown");
        let message = failed
            .message
            .clone()
            .unwrap_or_else(|| format!("guardrail condition {} failed", failed.condition_type));
        return GuardrailStatus::Failed {
            message: format!("{reason}: {message}"),
        };
    }

    GuardrailStatus::Pending
}

/// Contract for an external guardrail controller.
///
/// `get_claim` returning `None` for a claim that was previously created is a
/// permanent failure (`not_found`), never silently ignored: the engine maps it
/// to the resource's failure state.
#[async_trait]
pub trait GuardrailController: Send + Sync {
    /// File a new claim. Returns the controller-assigned claim name.
    async fn create_claim(&self, spec: GuardrailClaimSpec) -> AdapterResult<String>;

    /// Fetch the current snapshot of a claim, or `None` if it does not exist.
    async fn get_claim(&self, claim_name: &str) -> AdapterResult<Option<ClaimSnapshot>>;

    /// Delete a claim. Deleting an absent claim is a no-op.
    async fn delete_claim(&self, claim_name: &str) -> AdapterResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> GuardrailClaimSpec {
        GuardrailClaimSpec {
            account_id: "111111111111".parse().unwrap(),
            account_name: "dev-account".to_string(),
            role_arn: "arn:aws:iam::111111111111:role/nimbus-guardrail".to_string(),
            owner_email: "dev@x.com".to_string(),
            parameters: serde_json::json!({"budgetAmountUsd": 500}),
        }
    }

    fn claim_with(conditions: Vec<ClaimCondition>) -> ClaimSnapshot {
        ClaimSnapshot {
            name: "claim-dev-account".to_string(),
            spec: spec(),
            conditions,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_ready_true_maps_to_applied() {
        let claim = claim_with(vec![
            ClaimCondition::satisfied("Synced"),
            ClaimCondition::satisfied("Ready"),
        ]);
        assert_eq!(to_guardrail_status(&claim), GuardrailStatus::Applied);
    }

    #[test]
    fn test_failure_reason_maps_to_failed() {
        let claim = claim_with(vec![ClaimCondition::failed(
            "Synced",
            "ApplyFailure",
            "budget alert rejected",
        )]);
        match to_guardrail_status(&claim) {
            GuardrailStatus::Failed { message } => {
                assert!(message.contains("ApplyFailure"));
                assert!(message.contains("budget alert rejected"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn test_no_conditions_maps_to_pending() {
        let claim = claim_with(vec![]);
        assert_eq!(to_guardrail_status(&claim), GuardrailStatus::Pending);
    }

    #[test]
    fn test_unready_condition_without_reason_is_pending() {
        let claim = claim_with(vec![ClaimCondition {
            condition_type: "Ready".to_string(),
            status: "False".to_string(),
            reason: None,
            message: None,
        }]);
        assert_eq!(to_guardrail_status(&claim), GuardrailStatus::Pending);
    }

    #[test]
    fn test_ready_wins_over_stale_failure_reason() {
        // Controllers leave historical failure reasons on conditions after
        // recovering; Ready=True takes precedence.
        let claim = claim_with(vec![
            ClaimCondition::failed("Synced", "Transient", "first apply failed"),
            ClaimCondition::satisfied("Ready"),
        ]);
        assert_eq!(to_guardrail_status(&claim), GuardrailStatus::Applied);
    }
}
