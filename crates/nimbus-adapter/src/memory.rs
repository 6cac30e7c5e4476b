//! Deterministic in-memory adapter implementations
//!
//! Used by tests and local development. Behavior is scripted per request or
//! claim: a resource can succeed or fail after a fixed number of status polls,
//! so reconciliation paths are exercised without timers or real backends.
//!
//! Both implementations can also be told to fail their next N calls with an
//! injected transient error, which is how retry/backoff paths are tested.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use nimbus_core::AwsAccountId;

use crate::account_factory::{AccountFactory, FactoryReceipt, FactoryStatusReport};
use crate::error::{AdapterError, AdapterResult};
use crate::guardrail::{ClaimCondition, ClaimSnapshot, GuardrailClaimSpec, GuardrailController};

/// Scripted terminal outcome for an in-memory request or claim.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Report in-progress/pending for `polls` status checks, then succeed.
    SucceedAfter { polls: u32 },
    /// Report in-progress/pending for `polls` status checks, then fail.
    FailAfter { polls: u32, reason: String },
}

impl Default for ScriptedOutcome {
    fn default() -> Self {
        ScriptedOutcome::SucceedAfter { polls: 1 }
    }
}

struct FactoryRecord {
    outcome: ScriptedOutcome,
    account_id: AwsAccountId,
    polls_seen: u32,
}

struct FactoryInner {
    records: HashMap<String, FactoryRecord>,
    injected_errors: VecDeque<AdapterError>,
    next_account_number: u64,
    default_outcome: ScriptedOutcome,
}

/// In-memory [`AccountFactory`].
///
/// Assigns sequential 12-digit account numbers. Unknown request ids are
/// reported as `FAILED` with reason `not_found`, matching the contract.
pub struct InMemoryAccountFactory {
    inner: Mutex<FactoryInner>,
}

impl InMemoryAccountFactory {
    /// Create a factory whose requests succeed on the first status poll.
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_outcome(ScriptedOutcome::default())
    }

    /// Create a factory with a custom default outcome for new requests.
    #[must_use]
    pub fn with_default_outcome(outcome: ScriptedOutcome) -> Self {
        Self {
            inner: Mutex::new(FactoryInner {
                records: HashMap::new(),
                injected_errors: VecDeque::new(),
                next_account_number: 100_000_000_000,
                default_outcome: outcome,
            }),
        }
    }

    /// Override the outcome for a specific pending request.
    pub fn script_outcome(&self, request_id: &str, outcome: ScriptedOutcome) {
        let mut inner = self.inner.lock().expect("factory lock poisoned");
        if let Some(record) = inner.records.get_mut(request_id) {
            record.outcome = outcome;
        }
    }

    /// Fail the next adapter call with the given error.
    ///
    /// Errors are consumed in FIFO order, one per call, before any real work.
    pub fn inject_error(&self, error: AdapterError) {
        let mut inner = self.inner.lock().expect("factory lock poisoned");
        inner.injected_errors.push_back(error);
    }

    /// The account id a given request will (or did) resolve to.
    pub fn account_id_for(&self, request_id: &str) -> Option<AwsAccountId> {
        let inner = self.inner.lock().expect("factory lock poisoned");
        inner.records.get(request_id).map(|r| r.account_id.clone())
    }

    fn take_injected(inner: &mut FactoryInner) -> Option<AdapterError> {
        inner.injected_errors.pop_front()
    }
}

impl Default for InMemoryAccountFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountFactory for InMemoryAccountFactory {
    async fn create(&self, _name: &str, _email: &str) -> AdapterResult<FactoryReceipt> {
        let mut inner = self.inner.lock().expect("factory lock poisoned");
        if let Some(err) = Self::take_injected(&mut inner) {
            return Err(err);
        }

        let request_id = format!("car-{}", Uuid::new_v4());
        let account_id: AwsAccountId = format!("{:012}", inner.next_account_number)
            .parse()
            .map_err(|e| AdapterError::malformed(format!("generated account id: {e}")))?;
        inner.next_account_number += 1;

        let outcome = inner.default_outcome.clone();
        inner.records.insert(
            request_id.clone(),
            FactoryRecord {
                outcome,
                account_id,
                polls_seen: 0,
            },
        );

        Ok(FactoryReceipt { request_id })
    }

    async fn describe_status(&self, request_id: &str) -> AdapterResult<FactoryStatusReport> {
        let mut inner = self.inner.lock().expect("factory lock poisoned");
        if let Some(err) = Self::take_injected(&mut inner) {
            return Err(err);
        }

        let Some(record) = inner.records.get_mut(request_id) else {
            return Ok(FactoryStatusReport::failed(request_id, "not_found"));
        };

        record.polls_seen += 1;
        match &record.outcome {
            ScriptedOutcome::SucceedAfter { polls } => {
                if record.polls_seen >= *polls {
                    Ok(FactoryStatusReport::succeeded(
                        request_id,
                        record.account_id.clone(),
                    ))
                } else {
                    Ok(FactoryStatusReport::in_progress(request_id))
                }
            }
            ScriptedOutcome::FailAfter { polls, reason } => {
                if record.polls_seen >= *polls {
                    Ok(FactoryStatusReport::failed(request_id, reason.clone()))
                } else {
                    Ok(FactoryStatusReport::in_progress(request_id))
                }
            }
        }
    }
}

struct ClaimRecord {
    snapshot: ClaimSnapshot,
    outcome: ScriptedOutcome,
    polls_seen: u32,
}

struct ControllerInner {
    claims: HashMap<String, ClaimRecord>,
    injected_errors: VecDeque<AdapterError>,
    default_outcome: ScriptedOutcome,
}

/// In-memory [`GuardrailController`].
///
/// Claim names are derived from the account name. Conditions are synthesized
/// from the scripted outcome each time the claim is fetched.
pub struct InMemoryGuardrailController {
    inner: Mutex<ControllerInner>,
}

impl InMemoryGuardrailController {
    /// Create a controller whose claims apply on the first poll.
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_outcome(ScriptedOutcome::default())
    }

    /// Create a controller with a custom default outcome for new claims.
    #[must_use]
    pub fn with_default_outcome(outcome: ScriptedOutcome) -> Self {
        Self {
            inner: Mutex::new(ControllerInner {
                claims: HashMap::new(),
                injected_errors: VecDeque::new(),
                default_outcome: outcome,
            }),
        }
    }

    /// Override the outcome for a specific claim.
    pub fn script_outcome(&self, claim_name: &str, outcome: ScriptedOutcome) {
        let mut inner = self.inner.lock().expect("controller lock poisoned");
        if let Some(record) = inner.claims.get_mut(claim_name) {
            record.outcome = outcome;
        }
    }

    /// Fail the next adapter call with the given error.
    pub fn inject_error(&self, error: AdapterError) {
        let mut inner = self.inner.lock().expect("controller lock poisoned");
        inner.injected_errors.push_back(error);
    }

    /// Remove a claim behind the engine's back, simulating external deletion.
    pub fn forget_claim(&self, claim_name: &str) {
        let mut inner = self.inner.lock().expect("controller lock poisoned");
        inner.claims.remove(claim_name);
    }

    /// Number of claims currently held by the controller.
    pub fn claim_count(&self) -> usize {
        let inner = self.inner.lock().expect("controller lock poisoned");
        inner.claims.len()
    }
}

impl Default for InMemoryGuardrailController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GuardrailController for InMemoryGuardrailController {
    async fn create_claim(&self, spec: GuardrailClaimSpec) -> AdapterResult<String> {
        let mut inner = self.inner.lock().expect("controller lock poisoned");
        if let Some(err) = inner.injected_errors.pop_front() {
            return Err(err);
        }

        let claim_name = format!("guardrail-{}-{}", spec.account_name, spec.account_id);
        let outcome = inner.default_outcome.clone();
        inner.claims.insert(
            claim_name.clone(),
            ClaimRecord {
                snapshot: ClaimSnapshot {
                    name: claim_name.clone(),
                    spec,
                    conditions: Vec::new(),
                    created_at: Utc::now(),
                },
                outcome,
                polls_seen: 0,
            },
        );

        Ok(claim_name)
    }

    async fn get_claim(&self, claim_name: &str) -> AdapterResult<Option<ClaimSnapshot>> {
        let mut inner = self.inner.lock().expect("controller lock poisoned");
        if let Some(err) = inner.injected_errors.pop_front() {
            return Err(err);
        }

        let Some(record) = inner.claims.get_mut(claim_name) else {
            return Ok(None);
        };

        record.polls_seen += 1;
        let conditions = match &record.outcome {
            ScriptedOutcome::SucceedAfter { polls } => {
                if record.polls_seen >= *polls {
                    vec![
                        ClaimCondition::satisfied("Synced"),
                        ClaimCondition::satisfied("Ready"),
                    ]
                } else {
                    vec![]
                }
            }
            ScriptedOutcome::FailAfter { polls, reason } => {
                if record.polls_seen >= *polls {
                    vec![ClaimCondition::failed(
                        "Synced",
                        reason.clone(),
                        "guardrail application failed",
                    )]
                } else {
                    vec![]
                }
            }
        };

        let mut snapshot = record.snapshot.clone();
        snapshot.conditions = conditions;
        Ok(Some(snapshot))
    }

    async fn delete_claim(&self, claim_name: &str) -> AdapterResult<()> {
        let mut inner = self.inner.lock().expect("controller lock poisoned");
        if let Some(err) = inner.injected_errors.pop_front() {
            return Err(err);
        }
        inner.claims.remove(claim_name);
        Ok(())
    }
}
