//! Optimistic Client Cache
//!
//! Client-side mirror of a resource collection for UIs that apply mutations
//! before the server confirms them. Each speculative mutation is tracked as a
//! pending entry until the authoritative response commits or rolls it back,
//! and a running success-rate estimate calibrates how much trust the UI
//! should display for in-flight changes.
//!
//! This crate is deliberately free of server-side concerns: it never talks to
//! a repository or adapter, and the success rate is advisory telemetry with
//! no bearing on server-side transition legality.

pub mod confidence;
pub mod store;

pub use confidence::{NetworkQuality, SuccessRateEstimator};
pub use store::{CacheItem, OptimisticStore, PendingUpdate, UpdateId, UpdateKind};
