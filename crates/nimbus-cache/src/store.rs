//! Optimistic mutation store
//!
//! A client-side mirror of one resource collection. Mutations are applied to
//! the visible collection immediately and recorded as pending entries in a
//! ledger keyed by an opaque update id; the caller commits or rolls back each
//! entry once the authoritative response arrives.
//!
//! Commit and rollback callbacks can arrive out of order relative to
//! issuance, and network retries can duplicate them, so both operations are
//! idempotent: resolving an id that is no longer pending returns `false` and
//! changes nothing.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::confidence::{NetworkQuality, SuccessRateEstimator};

/// Opaque handle for one pending optimistic mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UpdateId(Uuid);

impl UpdateId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a pending entry did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Create,
    Update,
    Delete,
}

/// An item the store can hold: anything with a stable id.
pub trait CacheItem: Clone {
    /// The item's identity, matched against authoritative payloads.
    fn item_id(&self) -> Uuid;
}

/// One pending mutation, with enough information to undo it.
#[derive(Debug, Clone)]
struct OptimisticEntry<T> {
    kind: UpdateKind,
    item_id: Uuid,
    /// Pre-mutation snapshot; present for update and delete.
    rollback: Option<T>,
    /// Collection position at removal time, so delete rollback restores
    /// ordering.
    position: Option<usize>,
    applied_at: DateTime<Utc>,
    /// Estimator rate at application time, for UI trust display.
    confidence: f64,
}

/// Summary of a pending mutation, exposed for display.
#[derive(Debug, Clone)]
pub struct PendingUpdate {
    pub update_id: UpdateId,
    pub kind: UpdateKind,
    pub item_id: Uuid,
    pub applied_at: DateTime<Utc>,
    pub confidence: f64,
}

/// Optimistic store over one collection of `T`.
///
/// The visible collection preserves insertion order; rolling back a delete
/// restores the item at its original position.
pub struct OptimisticStore<T: CacheItem> {
    items: Vec<T>,
    pending: HashMap<UpdateId, OptimisticEntry<T>>,
    estimator: SuccessRateEstimator,
}

impl<T: CacheItem> OptimisticStore<T> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_items(Vec::new())
    }

    /// Create a store seeded with an authoritative collection.
    #[must_use]
    pub fn with_items(items: Vec<T>) -> Self {
        Self {
            items,
            pending: HashMap::new(),
            estimator: SuccessRateEstimator::new(),
        }
    }

    /// The visible collection, speculative mutations included.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Look up a visible item by id.
    #[must_use]
    pub fn get(&self, item_id: Uuid) -> Option<&T> {
        self.items.iter().find(|i| i.item_id() == item_id)
    }

    /// Whether an item currently has an unresolved mutation against it.
    #[must_use]
    pub fn is_pending(&self, item_id: Uuid) -> bool {
        self.pending.values().any(|e| e.item_id == item_id)
    }

    /// Pending mutations, for display.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingUpdate> {
        self.pending
            .iter()
            .map(|(update_id, e)| PendingUpdate {
                update_id: *update_id,
                kind: e.kind,
                item_id: e.item_id,
                applied_at: e.applied_at,
                confidence: e.confidence,
            })
            .collect()
    }

    /// Current success-rate estimate.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        self.estimator.rate()
    }

    /// Coarse trust classification of the current success rate.
    #[must_use]
    pub fn network_quality(&self) -> NetworkQuality {
        self.estimator.network_quality()
    }

    /// Speculatively add a new item.
    pub fn apply_create(&mut self, item: T) -> UpdateId {
        let item_id = item.item_id();
        self.items.push(item);
        self.record(UpdateKind::Create, item_id, None, None)
    }

    /// Speculatively replace an item. `rollback` is the pre-mutation snapshot
    /// restored if the server rejects the change.
    pub fn apply_update(&mut self, speculative: T, rollback: T) -> UpdateId {
        let item_id = speculative.item_id();
        match self.position_of(item_id) {
            Some(idx) => self.items[idx] = speculative,
            None => self.items.push(speculative),
        }
        self.record(UpdateKind::Update, item_id, Some(rollback), None)
    }

    /// Speculatively remove an item. `rollback` is the removed snapshot,
    /// restored at its original position if the server rejects the deletion.
    pub fn apply_delete(&mut self, rollback: T) -> UpdateId {
        let item_id = rollback.item_id();
        let position = self.position_of(item_id);
        if let Some(idx) = position {
            self.items.remove(idx);
        }
        self.record(UpdateKind::Delete, item_id, Some(rollback), position)
    }

    /// Resolve a pending mutation as confirmed.
    ///
    /// When an authoritative payload is supplied it replaces the optimistic
    /// item, so the collection converges on what the server actually stored.
    /// Returns `false` if the id is not pending (already resolved).
    pub fn commit(&mut self, update_id: UpdateId, authoritative: Option<T>) -> bool {
        let Some(entry) = self.pending.remove(&update_id) else {
            return false;
        };

        if let Some(authoritative) = authoritative {
            match self.position_of(entry.item_id) {
                Some(idx) => self.items[idx] = authoritative,
                // Commit of a delete has nothing visible to replace.
                None if entry.kind != UpdateKind::Delete => self.items.push(authoritative),
                None => {}
            }
        }

        self.estimator.record_commit();
        debug!(update_id = %update_id, kind = ?entry.kind, "Optimistic update committed");
        true
    }

    /// Resolve a pending mutation as rejected, reversing its effect.
    ///
    /// Returns `false` if the id is not pending (already resolved).
    pub fn rollback(&mut self, update_id: UpdateId) -> bool {
        let Some(entry) = self.pending.remove(&update_id) else {
            return false;
        };

        match entry.kind {
            UpdateKind::Create => {
                if let Some(idx) = self.position_of(entry.item_id) {
                    self.items.remove(idx);
                }
            }
            UpdateKind::Update => {
                if let Some(snapshot) = entry.rollback {
                    match self.position_of(entry.item_id) {
                        Some(idx) => self.items[idx] = snapshot,
                        None => self.items.push(snapshot),
                    }
                }
            }
            UpdateKind::Delete => {
                if let Some(snapshot) = entry.rollback {
                    let idx = entry.position.unwrap_or(self.items.len());
                    let idx = idx.min(self.items.len());
                    self.items.insert(idx, snapshot);
                }
            }
        }

        self.estimator.record_rollback();
        debug!(update_id = %update_id, kind = ?entry.kind, "Optimistic update rolled back");
        true
    }

    fn position_of(&self, item_id: Uuid) -> Option<usize> {
        self.items.iter().position(|i| i.item_id() == item_id)
    }

    fn record(
        &mut self,
        kind: UpdateKind,
        item_id: Uuid,
        rollback: Option<T>,
        position: Option<usize>,
    ) -> UpdateId {
        let update_id = UpdateId::new();
        self.pending.insert(
            update_id,
            OptimisticEntry {
                kind,
                item_id,
                rollback,
                position,
                applied_at: Utc::now(),
                confidence: self.estimator.rate(),
            },
        );
        update_id
    }
}

impl<T: CacheItem> Default for OptimisticStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
