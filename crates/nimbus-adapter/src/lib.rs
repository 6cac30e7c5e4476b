//! Adapter Framework
//!
//! Uniform contracts for the external control planes that own the real state
//! of provisioned resources:
//!
//! - [`AccountFactory`] - the account-creation backend (two-call polling
//!   contract: `create` + `describe_status`)
//! - [`GuardrailController`] - the declarative policy controller
//!   (`create_claim` / `get_claim` / `delete_claim`)
//!
//! Adapters are pure I/O: they hold no provisioning state and make no
//! decisions. Status vocabulary mapping ([`to_guardrail_status`]) is a pure
//! function so the reconciliation engine stays deterministic.
//!
//! Which implementation is active is decided once at startup by
//! configuration. The in-memory implementations in [`memory`] exist for tests
//! and local development and satisfy the same traits as live backends.

pub mod account_factory;
pub mod error;
pub mod guardrail;
pub mod memory;
pub mod resilience;

pub use account_factory::{AccountFactory, FactoryReceipt, FactoryState, FactoryStatusReport};
pub use error::{AdapterError, AdapterResult};
pub use guardrail::{
    to_guardrail_status, ClaimCondition, ClaimSnapshot, GuardrailClaimSpec, GuardrailController,
    GuardrailStatus,
};
pub use memory::{InMemoryAccountFactory, InMemoryGuardrailController, ScriptedOutcome};
pub use resilience::{RetryConfig, RetryExecutor};
