//! Provisioning Engine
//!
//! The core of the nimbus platform: account requests and team environments
//! move through explicit state machines, driven by a background poller that
//! reconciles desired state against the external control planes.
//!
//! # Architecture
//!
//! - [`model`] - immutable resource snapshots and their status enums
//! - [`lifecycle`] - pure transition functions over those snapshots
//! - [`validation`] - creation-time input validation (collected violations)
//! - [`repository`] - abstract keyed storage with owner/status scans
//! - [`services`] - the submit/get/list/cancel boundary plus environment verbs
//! - [`reconciler`] - one-tick-at-a-time convergence against the adapters
//! - [`worker`] - the polling loop that schedules ticks
//!
//! The split keeps every decision testable without I/O: the state machines
//! and validation are pure, the engine only talks to trait objects, and the
//! in-memory adapters and repository stand in for live backends.

pub mod lifecycle;
pub mod model;
pub mod reconciler;
pub mod repository;
pub mod services;
pub mod validation;
pub mod worker;

pub use lifecycle::{TransitionContext, TransitionError};
pub use model::{
    AccountRefKind, AccountRefStatus, AccountRequest, AccountRequestStatus, AwsAccountRef,
    BudgetGuardrails, EnvironmentHealth, EnvironmentParams, EnvironmentSize, EnvironmentStatus,
    TeamEnvironment,
};
pub use reconciler::{ReconcileError, Reconciler, ReconcilerConfig, TickOutcome};
pub use repository::{InMemoryRepository, RepoError, Resource, ResourceRepository};
pub use services::{
    AccountRefService, AccountRequestService, EnvironmentService, LinkAccountInput,
    SubmitAccountRequestInput, SubmitEnvironmentInput,
};
pub use worker::{PollerConfig, ProvisioningPoller};
