//! Provisioning state machines
//!
//! Pure transition functions over immutable snapshots. A transition takes the
//! current snapshot, a target status and a context, and returns either a new
//! snapshot or a [`TransitionError`]; the caller persists the result. Given
//! the same snapshot and target a transition always succeeds or always fails
//! the same way.
//!
//! A `TransitionError` is a programming or concurrency bug, never a condition
//! to retry: legality is fully determined by the snapshot, so an illegal jump
//! means some caller raced or skipped a step.

pub mod account;
pub mod environment;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Error raised by an illegal state-machine operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// The (current, target) pair is not in the transition table.
    #[error("invalid transition from {current} to {target}")]
    InvalidTransition { current: String, target: String },

    /// Guard: guardrails cannot be applied before the account exists.
    #[error("cannot transition to GUARDRAILING without AWS account ID")]
    MissingAwsAccountId,

    /// The external account id is write-once.
    #[error("AWS account ID is already set to {existing} and cannot be changed")]
    AwsAccountIdAlreadySet { existing: String },
}

/// Caller-supplied context for a transition.
///
/// Carries the failure text for transitions into failure states and the
/// timestamp to stamp, so tests can pin time.
#[derive(Debug, Clone)]
pub struct TransitionContext {
    /// Failure text recorded when entering a failure state.
    pub error_message: Option<String>,
    /// Timestamp used for `updated_at` / `last_reconciled_at` stamps.
    pub now: DateTime<Utc>,
}

impl TransitionContext {
    /// Context with the current time and no failure text.
    #[must_use]
    pub fn new() -> Self {
        Self {
            error_message: None,
            now: Utc::now(),
        }
    }

    /// Context carrying failure text for a transition into a failure state.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            now: Utc::now(),
        }
    }

    /// Pin the timestamp (test use).
    #[must_use]
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

impl Default for TransitionContext {
    fn default() -> Self {
        Self::new()
    }
}
