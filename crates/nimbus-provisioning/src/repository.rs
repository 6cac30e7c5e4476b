//! Resource repository
//!
//! Abstract keyed store for the three server-side resources with secondary
//! lookup by owner and by status. No business rules live here: updates are
//! last-writer-wins full-snapshot writes, and correctness relies on the
//! lifecycle module's transition guards rejecting stale jumps.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{AccountRequest, AwsAccountRef, TeamEnvironment};

/// Repository errors.
///
/// The in-memory implementation never fails, but the contract admits storage
/// failures so backed implementations can satisfy the same trait.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

impl From<RepoError> for nimbus_core::NimbusError {
    fn from(e: RepoError) -> Self {
        nimbus_core::NimbusError::internal(e.to_string())
    }
}

/// A storable resource: identity, owner and a status label for scans.
pub trait Resource: Clone + Send + Sync + 'static {
    /// The resource's unique id.
    fn resource_id(&self) -> Uuid;
    /// The owning user's id.
    fn owner_id(&self) -> Uuid;
    /// The current status, as its canonical string label.
    fn status_label(&self) -> &'static str;
}

impl Resource for AccountRequest {
    fn resource_id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    fn owner_id(&self) -> Uuid {
        *self.requester_id.as_uuid()
    }

    fn status_label(&self) -> &'static str {
        self.status.as_str()
    }
}

impl Resource for AwsAccountRef {
    fn resource_id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    fn owner_id(&self) -> Uuid {
        *self.owner_id.as_uuid()
    }

    fn status_label(&self) -> &'static str {
        self.status.as_str()
    }
}

impl Resource for TeamEnvironment {
    fn resource_id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    fn owner_id(&self) -> Uuid {
        *self.creator_id.as_uuid()
    }

    fn status_label(&self) -> &'static str {
        self.status.as_str()
    }
}

/// Keyed CRUD contract used by the services and the reconciliation engine.
#[async_trait]
pub trait ResourceRepository<T: Resource>: Send + Sync {
    /// Store a new snapshot. The id is already assigned by the constructor.
    async fn create(&self, resource: T) -> RepoResult<T>;

    /// Fetch a snapshot by id.
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<T>>;

    /// Fetch all snapshots belonging to an owner.
    async fn find_by_owner(&self, owner: Uuid) -> RepoResult<Vec<T>>;

    /// Fetch all snapshots in a given status.
    async fn find_by_status(&self, status: &str) -> RepoResult<Vec<T>>;

    /// Replace the stored snapshot (last-writer-wins). Returns the stored
    /// snapshot, or `None` if the id is unknown.
    async fn update(&self, id: Uuid, resource: T) -> RepoResult<Option<T>>;

    /// Remove a snapshot. Returns whether anything was removed.
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
}

/// In-memory repository used by tests and local development.
pub struct InMemoryRepository<T> {
    items: RwLock<HashMap<Uuid, T>>,
}

impl<T> InMemoryRepository<T> {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Resource> ResourceRepository<T> for InMemoryRepository<T> {
    async fn create(&self, resource: T) -> RepoResult<T> {
        let mut items = self.items.write().await;
        items.insert(resource.resource_id(), resource.clone());
        Ok(resource)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<T>> {
        let items = self.items.read().await;
        Ok(items.get(&id).cloned())
    }

    async fn find_by_owner(&self, owner: Uuid) -> RepoResult<Vec<T>> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter(|r| r.owner_id() == owner)
            .cloned()
            .collect())
    }

    async fn find_by_status(&self, status: &str) -> RepoResult<Vec<T>> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter(|r| r.status_label() == status)
            .cloned()
            .collect())
    }

    async fn update(&self, id: Uuid, resource: T) -> RepoResult<Option<T>> {
        let mut items = self.items.write().await;
        if !items.contains_key(&id) {
            return Ok(None);
        }
        items.insert(id, resource.clone());
        Ok(Some(resource))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let mut items = self.items.write().await;
        Ok(items.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AccountRequestStatus;
    use nimbus_core::RequesterId;

    fn request(requester: RequesterId) -> AccountRequest {
        AccountRequest::new(
            requester,
            "dev-account",
            "dev@x.com",
            "development",
            "us-west-2",
            None,
            None,
        )
    }

    #[tokio::test]
    async fn test_create_and_find_by_id() {
        let repo = InMemoryRepository::new();
        let req = request(RequesterId::new());
        let stored = repo.create(req.clone()).await.unwrap();
        assert_eq!(stored.id, req.id);

        let found = repo.find_by_id(*req.id.as_uuid()).await.unwrap().unwrap();
        assert_eq!(found.account_name, "dev-account");
    }

    #[tokio::test]
    async fn test_find_by_owner_filters() {
        let repo = InMemoryRepository::new();
        let alice = RequesterId::new();
        let bob = RequesterId::new();

        repo.create(request(alice)).await.unwrap();
        repo.create(request(alice)).await.unwrap();
        repo.create(request(bob)).await.unwrap();

        assert_eq!(repo.find_by_owner(*alice.as_uuid()).await.unwrap().len(), 2);
        assert_eq!(repo.find_by_owner(*bob.as_uuid()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_status_filters() {
        let repo = InMemoryRepository::new();
        let mut req = request(RequesterId::new());
        repo.create(req.clone()).await.unwrap();

        req.status = AccountRequestStatus::Creating;
        repo.update(*req.id.as_uuid(), req.clone()).await.unwrap();

        assert!(repo.find_by_status("REQUESTED").await.unwrap().is_empty());
        assert_eq!(repo.find_by_status("CREATING").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_id_returns_none() {
        let repo = InMemoryRepository::new();
        let req = request(RequesterId::new());
        let result = repo.update(*req.id.as_uuid(), req).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let repo = InMemoryRepository::new();
        let req = request(RequesterId::new());
        let id = *req.id.as_uuid();
        repo.create(req.clone()).await.unwrap();

        let mut a = req.clone();
        a.purpose = "first writer".to_string();
        let mut b = req.clone();
        b.purpose = "second writer".to_string();

        repo.update(id, a).await.unwrap();
        repo.update(id, b).await.unwrap();

        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.purpose, "second writer");
    }

    #[tokio::test]
    async fn test_delete_is_reported() {
        let repo = InMemoryRepository::new();
        let req = request(RequesterId::new());
        let id = *req.id.as_uuid();
        repo.create(req).await.unwrap();

        assert!(repo.delete(id).await.unwrap());
        assert!(!repo.delete(id).await.unwrap());
        assert!(repo.find_by_id(id).await.unwrap().is_none());
    }
}
