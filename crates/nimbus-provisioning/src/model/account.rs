//! Account request and account reference models

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nimbus_core::{AccountRefId, AccountRequestId, AwsAccountId, RequesterId};

/// Lifecycle status of an account provisioning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountRequestStatus {
    /// Submitted, not yet picked up.
    Requested,
    /// Pre-flight checks running.
    Validating,
    /// Account factory is creating the account.
    Creating,
    /// Account exists; guardrail claim filed and converging.
    Guardrailing,
    /// Fully provisioned. Terminal.
    Ready,
    /// Permanently failed. Terminal.
    Failed,
}

impl AccountRequestStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRequestStatus::Requested => "REQUESTED",
            AccountRequestStatus::Validating => "VALIDATING",
            AccountRequestStatus::Creating => "CREATING",
            AccountRequestStatus::Guardrailing => "GUARDRAILING",
            AccountRequestStatus::Ready => "READY",
            AccountRequestStatus::Failed => "FAILED",
        }
    }

    /// Legal successor statuses.
    #[must_use]
    pub fn allowed_targets(&self) -> &'static [AccountRequestStatus] {
        use AccountRequestStatus::*;
        match self {
            Requested => &[Validating, Failed],
            Validating => &[Creating, Failed],
            Creating => &[Guardrailing, Failed],
            Guardrailing => &[Ready, Failed],
            Ready => &[],
            Failed => &[],
        }
    }

    /// Whether this status has no outbound transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Coarse progress for UI and monitoring; not used for correctness.
    #[must_use]
    pub fn progress(&self) -> u8 {
        match self {
            AccountRequestStatus::Requested => 0,
            AccountRequestStatus::Validating => 20,
            AccountRequestStatus::Creating => 40,
            AccountRequestStatus::Guardrailing => 70,
            AccountRequestStatus::Ready => 100,
            AccountRequestStatus::Failed => 0,
        }
    }

    /// Every status, used by exhaustive transition tests and status scans.
    #[must_use]
    pub fn all() -> &'static [AccountRequestStatus] {
        use AccountRequestStatus::*;
        &[Requested, Validating, Creating, Guardrailing, Ready, Failed]
    }
}

impl std::fmt::Display for AccountRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Optional budget guardrail bundle on an account request.
///
/// Always present as a field (possibly `None` as a whole); individual members
/// are never conditionally attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetGuardrails {
    /// Monthly budget in USD.
    pub amount_usd: f64,
    /// Alert threshold as a percentage of the budget (1-100).
    pub alert_threshold_percent: u8,
    /// Regions the account is allowed to operate in.
    pub allowed_regions: Vec<String>,
}

/// A user-submitted intent to obtain a new cloud account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRequest {
    /// Unique identifier.
    pub id: AccountRequestId,
    /// The user who submitted the request and owns it.
    pub requester_id: RequesterId,
    /// Desired account display name.
    pub account_name: String,
    /// Root email for the new account.
    pub owner_email: String,
    /// Free-text purpose shown in reviews.
    pub purpose: String,
    /// Primary region for the account.
    pub region: String,
    /// Budget guardrail bundle, if requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetGuardrails>,
    /// Expiry after which the account is reclaimed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Current lifecycle status.
    pub status: AccountRequestStatus,
    /// The external account id, set once creation is confirmed, never cleared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_account_id: Option<AwsAccountId>,
    /// Factory-assigned polling handle, set when creation is submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factory_request_id: Option<String>,
    /// User-facing failure text; set iff status is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl AccountRequest {
    /// Create a new request in status `REQUESTED`.
    ///
    /// Callers are expected to have validated the input first.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        requester_id: RequesterId,
        account_name: impl Into<String>,
        owner_email: impl Into<String>,
        purpose: impl Into<String>,
        region: impl Into<String>,
        budget: Option<BudgetGuardrails>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AccountRequestId::new(),
            requester_id,
            account_name: account_name.into(),
            owner_email: owner_email.into(),
            purpose: purpose.into(),
            region: region.into(),
            budget,
            expires_at,
            status: AccountRequestStatus::Requested,
            aws_account_id: None,
            factory_request_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the request may still be cancelled by its requester.
    ///
    /// Once provisioning has succeeded or permanently failed the record is
    /// historical (or the external account already exists) and deletion is
    /// disallowed.
    #[must_use]
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self.status,
            AccountRequestStatus::Requested | AccountRequestStatus::Creating
        )
    }

    /// Return a copy carrying the factory polling handle.
    #[must_use]
    pub fn with_factory_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.factory_request_id = Some(request_id.into());
        self.updated_at = Utc::now();
        self
    }
}

/// Discriminator for how an account reference came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRefKind {
    /// Pre-existing account linked by its owner.
    Linked,
    /// Account created through nimbus provisioning.
    Managed,
}

/// Status of a referenced AWS account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRefStatus {
    /// Known and reachable; no guardrails applied.
    Linked,
    /// Guardrail claim filed and converging.
    Guardrailing,
    /// Guardrails fully applied.
    Guardrailed,
    /// Guardrail application failed.
    Error,
}

impl AccountRefStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRefStatus::Linked => "linked",
            AccountRefStatus::Guardrailing => "guardrailing",
            AccountRefStatus::Guardrailed => "guardrailed",
            AccountRefStatus::Error => "error",
        }
    }

    /// Whether this status requires a guardrail claim name on the reference.
    #[must_use]
    pub fn requires_claim(&self) -> bool {
        !matches!(self, AccountRefStatus::Linked)
    }
}

impl std::fmt::Display for AccountRefStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Local reference to an external AWS account, owned by a single user.
///
/// Invariant: `guardrail_claim_name` is present iff the status is one of the
/// guardrail statuses (`guardrailing`, `guardrailed`, `error`). The lifecycle
/// helpers maintain this; direct field mutation is the caller's risk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsAccountRef {
    /// Unique identifier.
    pub id: AccountRefId,
    /// The external 12-digit account number.
    pub account_id: AwsAccountId,
    /// Display name.
    pub display_name: String,
    /// Cross-account role ARN used by the guardrail controller.
    pub role_arn: String,
    /// Owning user.
    pub owner_id: RequesterId,
    /// Email receiving alerts for this account.
    pub owner_email: String,
    /// How this reference came to exist.
    pub kind: AccountRefKind,
    /// Current status.
    pub status: AccountRefStatus,
    /// Guardrail claim name; present iff status requires it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardrail_claim_name: Option<String>,
    /// User-facing failure text; set iff status is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl AwsAccountRef {
    /// Create a new reference in status `linked`.
    pub fn new(
        account_id: AwsAccountId,
        display_name: impl Into<String>,
        role_arn: impl Into<String>,
        owner_id: RequesterId,
        owner_email: impl Into<String>,
        kind: AccountRefKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AccountRefId::new(),
            account_id,
            display_name: display_name.into(),
            role_arn: role_arn.into(),
            owner_id,
            owner_email: owner_email.into(),
            kind,
            status: AccountRefStatus::Linked,
            guardrail_claim_name: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy with a filed guardrail claim, entering `guardrailing`.
    #[must_use]
    pub fn begin_guardrailing(mut self, claim_name: impl Into<String>) -> Self {
        self.status = AccountRefStatus::Guardrailing;
        self.guardrail_claim_name = Some(claim_name.into());
        self.error_message = None;
        self.updated_at = Utc::now();
        self
    }

    /// Copy marked `guardrailed`; the claim name is retained.
    #[must_use]
    pub fn mark_guardrailed(mut self) -> Self {
        self.status = AccountRefStatus::Guardrailed;
        self.error_message = None;
        self.updated_at = Utc::now();
        self
    }

    /// Copy marked `error` with a failure message; the claim name is retained.
    #[must_use]
    pub fn mark_error(mut self, message: impl Into<String>) -> Self {
        self.status = AccountRefStatus::Error;
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
        self
    }

    /// The claim-name invariant described on the type.
    #[must_use]
    pub fn claim_invariant_holds(&self) -> bool {
        self.status.requires_claim() == self.guardrail_claim_name.is_some()
    }
}

/// Map of named endpoints published by a provisioned resource.
pub type EndpointMap = HashMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AccountRequest {
        AccountRequest::new(
            RequesterId::new(),
            "dev-account",
            "dev@x.com",
            "development",
            "us-west-2",
            None,
            None,
        )
    }

    #[test]
    fn test_new_request_starts_requested() {
        let req = request();
        assert_eq!(req.status, AccountRequestStatus::Requested);
        assert!(req.aws_account_id.is_none());
        assert!(req.error_message.is_none());
    }

    #[test]
    fn test_progress_scale() {
        assert_eq!(AccountRequestStatus::Requested.progress(), 0);
        assert_eq!(AccountRequestStatus::Validating.progress(), 20);
        assert_eq!(AccountRequestStatus::Creating.progress(), 40);
        assert_eq!(AccountRequestStatus::Guardrailing.progress(), 70);
        assert_eq!(AccountRequestStatus::Ready.progress(), 100);
        assert_eq!(AccountRequestStatus::Failed.progress(), 0);
    }

    #[test]
    fn test_terminal_statuses_have_no_successors() {
        assert!(AccountRequestStatus::Ready.is_terminal());
        assert!(AccountRequestStatus::Failed.is_terminal());
        assert!(!AccountRequestStatus::Guardrailing.is_terminal());
    }

    #[test]
    fn test_cancellable_only_pre_terminal() {
        let mut req = request();
        assert!(req.is_cancellable());
        req.status = AccountRequestStatus::Creating;
        assert!(req.is_cancellable());
        req.status = AccountRequestStatus::Ready;
        assert!(!req.is_cancellable());
        req.status = AccountRequestStatus::Failed;
        assert!(!req.is_cancellable());
    }

    #[test]
    fn test_status_serializes_screaming() {
        let json = serde_json::to_string(&AccountRequestStatus::Guardrailing).unwrap();
        assert_eq!(json, "\"GUARDRAILING\"");
    }

    fn account_ref() -> AwsAccountRef {
        AwsAccountRef::new(
            "111111111111".parse().unwrap(),
            "dev-account",
            "arn:aws:iam::111111111111:role/nimbus-guardrail",
            RequesterId::new(),
            "dev@x.com",
            AccountRefKind::Managed,
        )
    }

    #[test]
    fn test_ref_claim_invariant_through_lifecycle() {
        let linked = account_ref();
        assert!(linked.claim_invariant_holds());

        let guardrailing = linked.begin_guardrailing("guardrail-dev");
        assert!(guardrailing.claim_invariant_holds());
        assert_eq!(guardrailing.status, AccountRefStatus::Guardrailing);

        let errored = guardrailing.clone().mark_error("apply failed");
        assert!(errored.claim_invariant_holds());
        assert_eq!(errored.error_message.as_deref(), Some("apply failed"));

        let guardrailed = guardrailing.mark_guardrailed();
        assert!(guardrailed.claim_invariant_holds());
        assert!(guardrailed.error_message.is_none());
    }
}
