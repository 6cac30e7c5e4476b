//! Team environment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nimbus_core::{AwsAccountId, EnvironmentId, RequesterId, TeamId};

use super::account::EndpointMap;

/// Lifecycle status of a team environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvironmentStatus {
    /// Submitted, not yet picked up.
    Requested,
    /// Pre-flight checks running.
    Validating,
    /// Guardrail controller is materializing the environment.
    Creating,
    /// Running and reconciled.
    Ready,
    /// A parameter change is being applied.
    Updating,
    /// Shutdown in progress.
    Pausing,
    /// Stopped; no workloads running.
    Paused,
    /// Restart in progress.
    Resuming,
    /// Teardown in progress.
    Deleting,
    /// Torn down. Terminal.
    Deleted,
    /// Reconciliation failed; retryable via update or deletable.
    Error,
}

impl EnvironmentStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentStatus::Requested => "REQUESTED",
            EnvironmentStatus::Validating => "VALIDATING",
            EnvironmentStatus::Creating => "CREATING",
            EnvironmentStatus::Ready => "READY",
            EnvironmentStatus::Updating => "UPDATING",
            EnvironmentStatus::Pausing => "PAUSING",
            EnvironmentStatus::Paused => "PAUSED",
            EnvironmentStatus::Resuming => "RESUMING",
            EnvironmentStatus::Deleting => "DELETING",
            EnvironmentStatus::Deleted => "DELETED",
            EnvironmentStatus::Error => "ERROR",
        }
    }

    /// Legal successor statuses.
    ///
    /// `Error` is additionally reachable from every non-terminal status; that
    /// edge is encoded here explicitly per source status.
    #[must_use]
    pub fn allowed_targets(&self) -> &'static [EnvironmentStatus] {
        use EnvironmentStatus::*;
        match self {
            Requested => &[Validating, Error],
            Validating => &[Creating, Error],
            Creating => &[Ready, Error],
            Ready => &[Updating, Pausing, Deleting, Error],
            Updating => &[Ready, Error],
            Pausing => &[Paused, Error],
            Paused => &[Resuming, Error],
            Resuming => &[Ready, Error],
            Deleting => &[Deleted, Error],
            Error => &[Updating, Deleting],
            Deleted => &[],
        }
    }

    /// Whether this status has no outbound transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Statuses the reconciliation poller must keep advancing.
    #[must_use]
    pub fn is_reconciling(&self) -> bool {
        use EnvironmentStatus::*;
        matches!(
            self,
            Requested | Validating | Creating | Updating | Pausing | Resuming | Deleting
        )
    }

    /// Every status, used by exhaustive transition tests.
    #[must_use]
    pub fn all() -> &'static [EnvironmentStatus] {
        use EnvironmentStatus::*;
        &[
            Requested, Validating, Creating, Ready, Updating, Pausing, Paused, Resuming, Deleting,
            Deleted, Error,
        ]
    }
}

impl std::fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observed health of a running environment.
///
/// Absent (`None` on the model) while the environment is paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Instance size class for an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentSize {
    Small,
    Medium,
    Large,
}

/// Parameter bundle for an environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentParams {
    /// Instance size class.
    pub size: EnvironmentSize,
    /// Deployment region.
    pub region: String,
    /// Whether autoscaling is enabled; bounds apply only when true.
    pub enable_auto_scaling: bool,
    /// Minimum instance count (>= 1 when autoscaling).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_instances: Option<u32>,
    /// Maximum instance count (<= 100 when autoscaling).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_instances: Option<u32>,
    /// Expiry after which the environment is reclaimed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether monitoring dashboards are provisioned.
    pub enable_monitoring: bool,
    /// Whether automated backups are provisioned.
    pub enable_backups: bool,
}

/// An ephemeral environment owned by a team, bound to one AWS account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamEnvironment {
    /// Unique identifier.
    pub id: EnvironmentId,
    /// Owning team.
    pub team_id: TeamId,
    /// Display name.
    pub name: String,
    /// Template this environment was stamped from.
    pub template_id: String,
    /// Template version (semantic version).
    pub template_version: String,
    /// The AWS account the environment lives in.
    pub account_id: AwsAccountId,
    /// Parameter bundle.
    pub params: EnvironmentParams,
    /// Logical resources materialized for this environment.
    pub resources: Vec<String>,
    /// The user who created the environment.
    pub creator_id: RequesterId,
    /// Current lifecycle status.
    pub status: EnvironmentStatus,
    /// Observed health; cleared while paused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<EnvironmentHealth>,
    /// Published endpoints by name.
    pub endpoints: EndpointMap,
    /// Guardrail claim driving this environment, once filed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_name: Option<String>,
    /// Last time reconciliation confirmed the observed state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reconciled_at: Option<DateTime<Utc>>,
    /// User-facing failure text; set iff status is `Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl TeamEnvironment {
    /// Create a new environment in status `REQUESTED`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        team_id: TeamId,
        name: impl Into<String>,
        template_id: impl Into<String>,
        template_version: impl Into<String>,
        account_id: AwsAccountId,
        params: EnvironmentParams,
        creator_id: RequesterId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EnvironmentId::new(),
            team_id,
            name: name.into(),
            template_id: template_id.into(),
            template_version: template_version.into(),
            account_id,
            params,
            resources: Vec::new(),
            creator_id,
            status: EnvironmentStatus::Requested,
            health: None,
            endpoints: EndpointMap::new(),
            claim_name: None,
            last_reconciled_at: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy carrying the filed claim name.
    #[must_use]
    pub fn with_claim_name(mut self, claim_name: impl Into<String>) -> Self {
        self.claim_name = Some(claim_name.into());
        self.updated_at = Utc::now();
        self
    }

    /// Autoscaling invariant: `min <= max <= 100` whenever enabled.
    #[must_use]
    pub fn autoscaling_invariant_holds(&self) -> bool {
        if !self.params.enable_auto_scaling {
            return true;
        }
        match (self.params.min_instances, self.params.max_instances) {
            (Some(min), Some(max)) => min <= max && max <= 100,
            _ => false,
        }
    }
}
