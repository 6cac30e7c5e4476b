//! Team environment service
//!
//! Submission plus the operational verbs (update, pause, resume, delete).
//! Every verb resolves access here and then asks the state machine for the
//! successor snapshot, so an illegal verb for the current status surfaces as
//! `IllegalState` and never reaches storage.

use std::sync::Arc;

use tracing::{info, instrument};

use nimbus_core::{EnvironmentId, NimbusError, RequesterId, Result};

use crate::lifecycle::{self, TransitionContext, TransitionError};
use crate::model::{EnvironmentParams, EnvironmentStatus, TeamEnvironment};
use crate::repository::ResourceRepository;
use crate::validation::{validate_environment, validate_environment_params};

use super::SubmitEnvironmentInput;

const RESOURCE: &str = "Environment";

/// Create, inspect and operate team environments.
pub struct EnvironmentService {
    environments: Arc<dyn ResourceRepository<TeamEnvironment>>,
}

impl EnvironmentService {
    pub fn new(environments: Arc<dyn ResourceRepository<TeamEnvironment>>) -> Self {
        Self { environments }
    }

    /// Validate and store a new environment in status `REQUESTED`.
    #[instrument(skip(self, input), fields(creator_id = %input.creator_id))]
    pub async fn submit(&self, input: SubmitEnvironmentInput) -> Result<TeamEnvironment> {
        validate_environment(&input)?;

        let params = EnvironmentParams {
            size: input.size,
            region: input.region,
            enable_auto_scaling: input.enable_auto_scaling,
            min_instances: input.min_instances,
            max_instances: input.max_instances,
            expires_at: input.expires_at,
            enable_monitoring: input.enable_monitoring,
            enable_backups: input.enable_backups,
        };
        let environment = TeamEnvironment::new(
            input.team_id,
            input.name,
            input.template_id,
            input.template_version,
            input.account_id,
            params,
            input.creator_id,
        );
        let stored = self.environments.create(environment).await?;
        info!(environment_id = %stored.id, "Environment submitted");
        Ok(stored)
    }

    /// Fetch an environment created by the caller.
    pub async fn get(
        &self,
        requester_id: RequesterId,
        id: EnvironmentId,
    ) -> Result<TeamEnvironment> {
        let environment = self
            .environments
            .find_by_id(*id.as_uuid())
            .await?
            .ok_or_else(|| NimbusError::not_found(RESOURCE, id))?;
        if environment.creator_id != requester_id {
            return Err(NimbusError::access_denied(RESOURCE));
        }
        Ok(environment)
    }

    /// List the caller's environments, newest first, optionally filtered by
    /// status.
    pub async fn list(
        &self,
        requester_id: RequesterId,
        status: Option<EnvironmentStatus>,
    ) -> Result<Vec<TeamEnvironment>> {
        let mut environments = self
            .environments
            .find_by_owner(*requester_id.as_uuid())
            .await?;
        if let Some(status) = status {
            environments.retain(|e| e.status == status);
        }
        environments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(environments)
    }

    /// Replace the mutable parameters and move the environment into
    /// `UPDATING` so the poller reconverges it. Also the retry verb for
    /// environments sitting in `ERROR`.
    #[instrument(skip(self, params))]
    pub async fn update(
        &self,
        requester_id: RequesterId,
        id: EnvironmentId,
        params: EnvironmentParams,
    ) -> Result<TeamEnvironment> {
        validate_environment_params(&params)?;
        let mut environment = self.get(requester_id, id).await?;
        environment.params = params;
        self.apply(environment, EnvironmentStatus::Updating).await
    }

    /// Suspend a `READY` environment.
    #[instrument(skip(self))]
    pub async fn pause(
        &self,
        requester_id: RequesterId,
        id: EnvironmentId,
    ) -> Result<TeamEnvironment> {
        let environment = self.get(requester_id, id).await?;
        self.apply(environment, EnvironmentStatus::Pausing).await
    }

    /// Wake a `PAUSED` environment.
    #[instrument(skip(self))]
    pub async fn resume(
        &self,
        requester_id: RequesterId,
        id: EnvironmentId,
    ) -> Result<TeamEnvironment> {
        let environment = self.get(requester_id, id).await?;
        self.apply(environment, EnvironmentStatus::Resuming).await
    }

    /// Delete an environment.
    ///
    /// Environments that never reached the backend (`REQUESTED`,
    /// `VALIDATING`) are removed outright; `READY` and `ERROR` environments
    /// move to `DELETING` so the poller tears down the claim first. Anything
    /// mid-flight must settle before it can be deleted.
    #[instrument(skip(self))]
    pub async fn delete(&self, requester_id: RequesterId, id: EnvironmentId) -> Result<()> {
        let environment = self.get(requester_id, id).await?;
        match environment.status {
            EnvironmentStatus::Requested | EnvironmentStatus::Validating => {
                self.environments.delete(*id.as_uuid()).await?;
                info!(environment_id = %id, "Environment removed before provisioning");
                Ok(())
            }
            EnvironmentStatus::Ready | EnvironmentStatus::Error => {
                self.apply(environment, EnvironmentStatus::Deleting).await?;
                Ok(())
            }
            other => Err(NimbusError::cannot_delete(other)),
        }
    }

    async fn apply(
        &self,
        environment: TeamEnvironment,
        target: EnvironmentStatus,
    ) -> Result<TeamEnvironment> {
        let next =
            lifecycle::environment::transition(&environment, target, &TransitionContext::new())
                .map_err(illegal)?;
        let stored = self
            .environments
            .update(*next.id.as_uuid(), next)
            .await?
            .ok_or_else(|| NimbusError::not_found(RESOURCE, environment.id))?;
        info!(environment_id = %stored.id, status = %stored.status, "Environment verb applied");
        Ok(stored)
    }
}

fn illegal(e: TransitionError) -> NimbusError {
    NimbusError::IllegalState {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EnvironmentSize;
    use crate::repository::InMemoryRepository;
    use nimbus_core::TeamId;

    fn setup() -> (Arc<InMemoryRepository<TeamEnvironment>>, EnvironmentService) {
        let repo = Arc::new(InMemoryRepository::new());
        (repo.clone(), EnvironmentService::new(repo))
    }

    fn input(creator_id: RequesterId) -> SubmitEnvironmentInput {
        SubmitEnvironmentInput {
            team_id: TeamId::new(),
            creator_id,
            name: "checkout-staging".to_string(),
            template_id: "web-service".to_string(),
            template_version: "1.4.0".to_string(),
            account_id: "111111111111".parse().unwrap(),
            size: EnvironmentSize::Small,
            region: "us-west-2".to_string(),
            enable_auto_scaling: false,
            min_instances: None,
            max_instances: None,
            expires_at: None,
            enable_monitoring: true,
            enable_backups: false,
        }
    }

    async fn force_status(
        repo: &InMemoryRepository<TeamEnvironment>,
        env: &TeamEnvironment,
        status: EnvironmentStatus,
    ) {
        let mut copy = env.clone();
        copy.status = status;
        repo.update(*env.id.as_uuid(), copy).await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_starts_requested() {
        let (_, svc) = setup();
        let creator = RequesterId::new();
        let stored = svc.submit(input(creator)).await.unwrap();
        assert_eq!(stored.status, EnvironmentStatus::Requested);
    }

    #[tokio::test]
    async fn test_pause_requires_ready() {
        let (repo, svc) = setup();
        let creator = RequesterId::new();
        let stored = svc.submit(input(creator)).await.unwrap();

        let err = svc.pause(creator, stored.id).await.unwrap_err();
        assert!(matches!(err, NimbusError::IllegalState { .. }));

        force_status(&repo, &stored, EnvironmentStatus::Ready).await;
        let paused = svc.pause(creator, stored.id).await.unwrap();
        assert_eq!(paused.status, EnvironmentStatus::Pausing);
    }

    #[tokio::test]
    async fn test_update_retries_from_error() {
        let (repo, svc) = setup();
        let creator = RequesterId::new();
        let stored = svc.submit(input(creator)).await.unwrap();
        force_status(&repo, &stored, EnvironmentStatus::Error).await;

        let updated = svc
            .update(creator, stored.id, stored.params.clone())
            .await
            .unwrap();
        assert_eq!(updated.status, EnvironmentStatus::Updating);
    }

    #[tokio::test]
    async fn test_update_validates_params() {
        let (repo, svc) = setup();
        let creator = RequesterId::new();
        let stored = svc.submit(input(creator)).await.unwrap();
        force_status(&repo, &stored, EnvironmentStatus::Ready).await;

        let mut params = stored.params.clone();
        params.enable_auto_scaling = true;
        params.min_instances = Some(10);
        params.max_instances = Some(2);

        let err = svc.update(creator, stored.id, params).await.unwrap_err();
        assert!(matches!(err, NimbusError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_delete_before_provisioning_removes() {
        let (repo, svc) = setup();
        let creator = RequesterId::new();
        let stored = svc.submit(input(creator)).await.unwrap();

        svc.delete(creator, stored.id).await.unwrap();
        assert!(repo
            .find_by_id(*stored.id.as_uuid())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_ready_moves_to_deleting() {
        let (repo, svc) = setup();
        let creator = RequesterId::new();
        let stored = svc.submit(input(creator)).await.unwrap();
        force_status(&repo, &stored, EnvironmentStatus::Ready).await;

        svc.delete(creator, stored.id).await.unwrap();
        let current = repo
            .find_by_id(*stored.id.as_uuid())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.status, EnvironmentStatus::Deleting);
    }

    #[tokio::test]
    async fn test_delete_mid_flight_is_rejected() {
        let (repo, svc) = setup();
        let creator = RequesterId::new();
        let stored = svc.submit(input(creator)).await.unwrap();
        force_status(&repo, &stored, EnvironmentStatus::Creating).await;

        let err = svc.delete(creator, stored.id).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot delete resource in status CREATING"
        );
    }

    #[tokio::test]
    async fn test_foreign_environment_is_access_denied() {
        let (_, svc) = setup();
        let stored = svc.submit(input(RequesterId::new())).await.unwrap();
        let err = svc.get(RequesterId::new(), stored.id).await.unwrap_err();
        assert!(matches!(err, NimbusError::AccessDenied { .. }));
    }
}
