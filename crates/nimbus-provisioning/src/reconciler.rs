//! Reconciliation engine
//!
//! Advances a resource's status by polling the external adapters and feeding
//! the observed state through the lifecycle machines. One tick is a single
//! read-adapter-write cycle for one resource; ticks for the same resource are
//! serialized by the poller (see [`crate::worker`]).
//!
//! Error policy: transient adapter errors are retried
//! with in-call backoff and a cross-tick attempt budget; exhausting the budget
//! moves the resource to its failure state with a synthetic reason so nothing
//! is ever stuck silently. Permanent adapter errors and terminal backend
//! reports fail the resource immediately. A `TransitionError` here is a bug
//! and is propagated for the worker to log, never retried.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use nimbus_adapter::{
    to_guardrail_status, AccountFactory, AdapterError, FactoryState, GuardrailClaimSpec,
    GuardrailController, GuardrailStatus, RetryConfig, RetryExecutor,
};
use nimbus_core::AwsAccountId;

use crate::lifecycle::{self, TransitionContext, TransitionError};
use crate::model::{
    AccountRefKind, AccountRequest, AccountRequestStatus, AwsAccountRef, EnvironmentStatus,
    TeamEnvironment,
};
use crate::repository::{RepoError, ResourceRepository};

/// Role name assumed by the guardrail controller inside each account.
const ENVIRONMENT_ROLE_NAME: &str = "nimbus-environment";

/// Engine configuration. Backoff bounds and the attempt budget are tunable,
/// not contractual.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Cross-tick adapter failure budget per resource.
    pub max_attempts: u32,
    /// In-call retry/backoff settings.
    pub retry: RetryConfig,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry: RetryConfig::default(),
        }
    }
}

/// Errors escaping a tick. Adapter failures never appear here; they are
/// resolved inside the engine as either "retry next tick" or a failure-state
/// transition.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Storage failure.
    #[error(transparent)]
    Repo(#[from] RepoError),

    /// Illegal state jump; a bug, logged by the worker.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The resource vanished between scan and tick.
    #[error("resource {0} no longer exists")]
    Gone(Uuid),
}

/// Result type for engine operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The resource moved to a new status.
    Advanced,
    /// The backend is still working; try again next tick.
    Pending,
    /// The resource is terminal (or not pollable) and should be retired.
    Terminal,
}

/// Reconciliation engine over the repositories and both adapters.
pub struct Reconciler {
    requests: Arc<dyn ResourceRepository<AccountRequest>>,
    refs: Arc<dyn ResourceRepository<AwsAccountRef>>,
    environments: Arc<dyn ResourceRepository<TeamEnvironment>>,
    factory: Arc<dyn AccountFactory>,
    guardrails: Arc<dyn GuardrailController>,
    retry: RetryExecutor,
    attempts: Mutex<HashMap<Uuid, u32>>,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create an engine with the given collaborators.
    pub fn new(
        requests: Arc<dyn ResourceRepository<AccountRequest>>,
        refs: Arc<dyn ResourceRepository<AwsAccountRef>>,
        environments: Arc<dyn ResourceRepository<TeamEnvironment>>,
        factory: Arc<dyn AccountFactory>,
        guardrails: Arc<dyn GuardrailController>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            requests,
            refs,
            environments,
            factory,
            guardrails,
            retry: RetryExecutor::new(config.retry.clone()),
            attempts: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Advance one account request by one step.
    pub async fn tick_account_request(&self, id: Uuid) -> ReconcileResult<TickOutcome> {
        let request = self
            .requests
            .find_by_id(id)
            .await?
            .ok_or(ReconcileError::Gone(id))?;

        if request.status.is_terminal() {
            return Ok(TickOutcome::Terminal);
        }

        match request.status {
            AccountRequestStatus::Requested => {
                self.persist_request(lifecycle::account::transition(
                    &request,
                    AccountRequestStatus::Validating,
                    &TransitionContext::new(),
                )?)
                .await?;
                Ok(TickOutcome::Advanced)
            }
            AccountRequestStatus::Validating => self.submit_to_factory(request).await,
            AccountRequestStatus::Creating => self.poll_factory(request).await,
            AccountRequestStatus::Guardrailing => self.poll_request_guardrails(request).await,
            AccountRequestStatus::Ready | AccountRequestStatus::Failed => Ok(TickOutcome::Terminal),
        }
    }

    async fn submit_to_factory(&self, request: AccountRequest) -> ReconcileResult<TickOutcome> {
        let name = request.account_name.clone();
        let email = request.owner_email.clone();
        let factory = self.factory.clone();

        let receipt = match self
            .retry
            .execute(|| {
                let factory = factory.clone();
                let name = name.clone();
                let email = email.clone();
                async move { factory.create(&name, &email).await }
            })
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => return self.absorb_request_error(request, e).await,
        };
        self.clear_attempts(*request.id.as_uuid());

        let submitted = request.with_factory_request_id(receipt.request_id);
        // Already CREATING when this is a resubmission after a lost handle.
        let creating = if submitted.status == AccountRequestStatus::Creating {
            submitted
        } else {
            lifecycle::account::transition(
                &submitted,
                AccountRequestStatus::Creating,
                &TransitionContext::new(),
            )?
        };
        self.persist_request(creating).await?;
        Ok(TickOutcome::Advanced)
    }

    async fn poll_factory(&self, request: AccountRequest) -> ReconcileResult<TickOutcome> {
        let Some(factory_request_id) = request.factory_request_id.clone() else {
            // Submission never completed; go back through the submit path.
            return self.submit_to_factory(request).await;
        };

        let factory = self.factory.clone();
        let report = match self
            .retry
            .execute(|| {
                let factory = factory.clone();
                let id = factory_request_id.clone();
                async move { factory.describe_status(&id).await }
            })
            .await
        {
            Ok(report) => report,
            Err(e) => return self.absorb_request_error(request, e).await,
        };
        self.clear_attempts(*request.id.as_uuid());

        match report.state {
            FactoryState::InProgress => Ok(TickOutcome::Pending),
            FactoryState::Succeeded => {
                let Some(account_id) = report.account_id else {
                    return self
                        .fail_request(request, "factory reported success without an account id")
                        .await;
                };
                self.begin_guardrailing(request, account_id).await
            }
            FactoryState::Failed => {
                let reason = report
                    .failure_reason
                    .unwrap_or_else(|| "account creation failed".to_string());
                self.fail_request(request, reason).await
            }
        }
    }

    /// Record the account id, materialize the managed account reference, file
    /// the guardrail claim and move the request into `GUARDRAILING`.
    async fn begin_guardrailing(
        &self,
        request: AccountRequest,
        account_id: AwsAccountId,
    ) -> ReconcileResult<TickOutcome> {
        let request = lifecycle::account::record_aws_account_id(&request, account_id.clone())?;
        // Persist the account id before filing the claim: if claim creation
        // fails, the id must survive (it is write-once and the account exists).
        let request = self
            .persist_request(request)
            .await?;

        let account_ref = AwsAccountRef::new(
            account_id.clone(),
            request.account_name.clone(),
            format!("arn:aws:iam::{account_id}:role/{ENVIRONMENT_ROLE_NAME}"),
            request.requester_id,
            request.owner_email.clone(),
            AccountRefKind::Managed,
        );

        let spec = GuardrailClaimSpec {
            account_id,
            account_name: request.account_name.clone(),
            role_arn: account_ref.role_arn.clone(),
            owner_email: request.owner_email.clone(),
            parameters: serde_json::to_value(&request.budget).unwrap_or_default(),
        };

        let guardrails = self.guardrails.clone();
        let claim_name = match self
            .retry
            .execute(|| {
                let guardrails = guardrails.clone();
                let spec = spec.clone();
                async move { guardrails.create_claim(spec).await }
            })
            .await
        {
            Ok(name) => name,
            Err(e) => return self.absorb_request_error(request, e).await,
        };
        self.clear_attempts(*request.id.as_uuid());

        self.refs
            .create(account_ref.begin_guardrailing(&claim_name))
            .await?;

        let guardrailing = lifecycle::account::transition(
            &request,
            AccountRequestStatus::Guardrailing,
            &TransitionContext::new(),
        )?;
        self.persist_request(guardrailing).await?;

        info!(request_id = %request.id, claim = %claim_name, "Filed guardrail claim");
        Ok(TickOutcome::Advanced)
    }

    async fn poll_request_guardrails(
        &self,
        request: AccountRequest,
    ) -> ReconcileResult<TickOutcome> {
        let Some(account_ref) = self.managed_ref_for(&request).await? else {
            return self
                .fail_request(request, "guardrail bookkeeping lost: no account reference")
                .await;
        };
        let Some(claim_name) = account_ref.guardrail_claim_name.clone() else {
            return self
                .fail_request(request, "guardrail bookkeeping lost: no claim name")
                .await;
        };

        let guardrails = self.guardrails.clone();
        let claim = match self
            .retry
            .execute(|| {
                let guardrails = guardrails.clone();
                let name = claim_name.clone();
                async move { guardrails.get_claim(&name).await }
            })
            .await
        {
            Ok(claim) => claim,
            Err(e) => return self.absorb_request_error(request, e).await,
        };
        self.clear_attempts(*request.id.as_uuid());

        let status = match claim {
            Some(snapshot) => to_guardrail_status(&snapshot),
            // A claim that was created but is now absent failed permanently.
            None => GuardrailStatus::Failed {
                message: "not_found: guardrail claim disappeared".to_string(),
            },
        };

        match status {
            GuardrailStatus::Pending => Ok(TickOutcome::Pending),
            GuardrailStatus::Applied => {
                self.refs
                    .update(
                        *account_ref.id.as_uuid(),
                        account_ref.mark_guardrailed(),
                    )
                    .await?;
                let ready = lifecycle::account::transition(
                    &request,
                    AccountRequestStatus::Ready,
                    &TransitionContext::new(),
                )?;
                self.persist_request(ready).await?;
                info!(request_id = %request.id, "Account request ready");
                Ok(TickOutcome::Advanced)
            }
            GuardrailStatus::Failed { message } => {
                self.refs
                    .update(
                        *account_ref.id.as_uuid(),
                        account_ref.mark_error(message.clone()),
                    )
                    .await?;
                self.fail_request(request, message).await
            }
        }
    }

    /// Advance one environment by one step.
    pub async fn tick_environment(&self, id: Uuid) -> ReconcileResult<TickOutcome> {
        let environment = self
            .environments
            .find_by_id(id)
            .await?
            .ok_or(ReconcileError::Gone(id))?;

        if !environment.status.is_reconciling() {
            return Ok(TickOutcome::Terminal);
        }

        match environment.status {
            EnvironmentStatus::Requested => {
                self.persist_environment(lifecycle::environment::transition(
                    &environment,
                    EnvironmentStatus::Validating,
                    &TransitionContext::new(),
                )?)
                .await?;
                Ok(TickOutcome::Advanced)
            }
            EnvironmentStatus::Validating => self.file_environment_claim(environment).await,
            EnvironmentStatus::Creating
            | EnvironmentStatus::Updating
            | EnvironmentStatus::Resuming => {
                self.poll_environment_claim(environment, EnvironmentStatus::Ready)
                    .await
            }
            EnvironmentStatus::Pausing => {
                self.poll_environment_claim(environment, EnvironmentStatus::Paused)
                    .await
            }
            EnvironmentStatus::Deleting => self.teardown_environment(environment).await,
            _ => Ok(TickOutcome::Terminal),
        }
    }

    async fn file_environment_claim(
        &self,
        environment: TeamEnvironment,
    ) -> ReconcileResult<TickOutcome> {
        let spec = GuardrailClaimSpec {
            account_id: environment.account_id.clone(),
            account_name: environment.name.clone(),
            role_arn: format!(
                "arn:aws:iam::{}:role/{ENVIRONMENT_ROLE_NAME}",
                environment.account_id
            ),
            owner_email: String::new(),
            parameters: serde_json::to_value(&environment.params).unwrap_or_default(),
        };

        let guardrails = self.guardrails.clone();
        let claim_name = match self
            .retry
            .execute(|| {
                let guardrails = guardrails.clone();
                let spec = spec.clone();
                async move { guardrails.create_claim(spec).await }
            })
            .await
        {
            Ok(name) => name,
            Err(e) => return self.absorb_environment_error(environment, e).await,
        };
        self.clear_attempts(*environment.id.as_uuid());

        let creating = lifecycle::environment::transition(
            &environment.with_claim_name(claim_name),
            EnvironmentStatus::Creating,
            &TransitionContext::new(),
        )?;
        self.persist_environment(creating).await?;
        Ok(TickOutcome::Advanced)
    }

    async fn poll_environment_claim(
        &self,
        environment: TeamEnvironment,
        on_applied: EnvironmentStatus,
    ) -> ReconcileResult<TickOutcome> {
        let Some(claim_name) = environment.claim_name.clone() else {
            return self
                .error_environment(environment, "guardrail bookkeeping lost: no claim name")
                .await;
        };

        let guardrails = self.guardrails.clone();
        let claim = match self
            .retry
            .execute(|| {
                let guardrails = guardrails.clone();
                let name = claim_name.clone();
                async move { guardrails.get_claim(&name).await }
            })
            .await
        {
            Ok(claim) => claim,
            Err(e) => return self.absorb_environment_error(environment, e).await,
        };
        self.clear_attempts(*environment.id.as_uuid());

        let status = match claim {
            Some(snapshot) => to_guardrail_status(&snapshot),
            None => GuardrailStatus::Failed {
                message: "not_found: environment claim disappeared".to_string(),
            },
        };

        match status {
            GuardrailStatus::Pending => Ok(TickOutcome::Pending),
            GuardrailStatus::Applied => {
                let next = lifecycle::environment::transition(
                    &environment,
                    on_applied,
                    &TransitionContext::new(),
                )?;
                self.persist_environment(next).await?;
                Ok(TickOutcome::Advanced)
            }
            GuardrailStatus::Failed { message } => {
                self.error_environment(environment, message).await
            }
        }
    }

    async fn teardown_environment(
        &self,
        environment: TeamEnvironment,
    ) -> ReconcileResult<TickOutcome> {
        if let Some(claim_name) = environment.claim_name.clone() {
            let guardrails = self.guardrails.clone();
            if let Err(e) = self
                .retry
                .execute(|| {
                    let guardrails = guardrails.clone();
                    let name = claim_name.clone();
                    async move { guardrails.delete_claim(&name).await }
                })
                .await
            {
                return self.absorb_environment_error(environment, e).await;
            }
            self.clear_attempts(*environment.id.as_uuid());
        }

        let deleted = lifecycle::environment::transition(
            &environment,
            EnvironmentStatus::Deleted,
            &TransitionContext::new(),
        )?;
        self.persist_environment(deleted).await?;
        info!(environment_id = %environment.id, "Environment deleted");
        Ok(TickOutcome::Advanced)
    }

    // Failure plumbing

    /// Absorb an adapter error for an account request: transient errors burn
    /// one unit of the attempt budget, permanent errors fail immediately.
    async fn absorb_request_error(
        &self,
        request: AccountRequest,
        error: AdapterError,
    ) -> ReconcileResult<TickOutcome> {
        if error.is_transient() {
            match self.note_attempt(*request.id.as_uuid()) {
                Some(exhausted) => self.fail_request(request, exhausted).await,
                None => {
                    warn!(
                        request_id = %request.id,
                        error = %error,
                        "Transient adapter error, will retry next tick"
                    );
                    Ok(TickOutcome::Pending)
                }
            }
        } else {
            self.fail_request(request, error.to_string()).await
        }
    }

    async fn absorb_environment_error(
        &self,
        environment: TeamEnvironment,
        error: AdapterError,
    ) -> ReconcileResult<TickOutcome> {
        if error.is_transient() {
            match self.note_attempt(*environment.id.as_uuid()) {
                Some(exhausted) => self.error_environment(environment, exhausted).await,
                None => {
                    warn!(
                        environment_id = %environment.id,
                        error = %error,
                        "Transient adapter error, will retry next tick"
                    );
                    Ok(TickOutcome::Pending)
                }
            }
        } else {
            self.error_environment(environment, error.to_string()).await
        }
    }

    async fn fail_request(
        &self,
        request: AccountRequest,
        reason: impl Into<String>,
    ) -> ReconcileResult<TickOutcome> {
        let reason = reason.into();
        warn!(request_id = %request.id, reason = %reason, "Account request failed");
        let failed = lifecycle::account::transition(
            &request,
            AccountRequestStatus::Failed,
            &TransitionContext::failure(reason),
        )?;
        self.persist_request(failed).await?;
        self.clear_attempts(*request.id.as_uuid());
        Ok(TickOutcome::Advanced)
    }

    async fn error_environment(
        &self,
        environment: TeamEnvironment,
        reason: impl Into<String>,
    ) -> ReconcileResult<TickOutcome> {
        let reason = reason.into();
        warn!(environment_id = %environment.id, reason = %reason, "Environment errored");
        let errored = lifecycle::environment::transition(
            &environment,
            EnvironmentStatus::Error,
            &TransitionContext::failure(reason),
        )?;
        self.persist_environment(errored).await?;
        self.clear_attempts(*environment.id.as_uuid());
        Ok(TickOutcome::Advanced)
    }

    async fn managed_ref_for(
        &self,
        request: &AccountRequest,
    ) -> ReconcileResult<Option<AwsAccountRef>> {
        let Some(account_id) = &request.aws_account_id else {
            return Ok(None);
        };
        let refs = self
            .refs
            .find_by_owner(*request.requester_id.as_uuid())
            .await?;
        Ok(refs.into_iter().find(|r| r.account_id == *account_id))
    }

    async fn persist_request(&self, request: AccountRequest) -> ReconcileResult<AccountRequest> {
        let id = *request.id.as_uuid();
        self.requests
            .update(id, request)
            .await?
            .ok_or(ReconcileError::Gone(id))
    }

    async fn persist_environment(
        &self,
        environment: TeamEnvironment,
    ) -> ReconcileResult<TeamEnvironment> {
        let id = *environment.id.as_uuid();
        self.environments
            .update(id, environment)
            .await?
            .ok_or(ReconcileError::Gone(id))
    }

    /// Burn one unit of the attempt budget. Returns the synthetic failure
    /// reason once the budget is spent.
    fn note_attempt(&self, id: Uuid) -> Option<String> {
        let mut attempts = self.attempts.lock().unwrap_or_else(|p| p.into_inner());
        let count = attempts.entry(id).or_insert(0);
        *count += 1;
        if *count >= self.config.max_attempts {
            attempts.remove(&id);
            Some(format!(
                "reconciliation exhausted after {} attempts",
                self.config.max_attempts
            ))
        } else {
            None
        }
    }

    fn clear_attempts(&self, id: Uuid) {
        let mut attempts = self.attempts.lock().unwrap_or_else(|p| p.into_inner());
        attempts.remove(&id);
    }
}
