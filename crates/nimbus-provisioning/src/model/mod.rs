//! Domain models
//!
//! Immutable snapshots of the three server-side resources. The lifecycle
//! module computes new snapshots from these; the repository persists them.
//! No model method performs I/O.

pub mod account;
pub mod environment;

pub use account::{
    AccountRefKind, AccountRefStatus, AccountRequest, AccountRequestStatus, AwsAccountRef,
    BudgetGuardrails, EndpointMap,
};
pub use environment::{
    EnvironmentHealth, EnvironmentParams, EnvironmentSize, EnvironmentStatus, TeamEnvironment,
};
