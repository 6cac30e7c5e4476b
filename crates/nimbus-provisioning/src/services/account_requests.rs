//! Account request service

use std::sync::Arc;

use tracing::{info, instrument};

use nimbus_core::{AccountRequestId, NimbusError, RequesterId, Result};

use crate::model::{AccountRequest, AccountRequestStatus};
use crate::repository::ResourceRepository;
use crate::validation::validate_account_request;

use super::SubmitAccountRequestInput;

const RESOURCE: &str = "AccountRequest";

/// Submit, inspect and cancel account provisioning requests.
///
/// All reads are scoped to the requester: existence is checked first, then
/// ownership, so probing an existing foreign id yields `AccessDenied` while an
/// unknown id yields `NotFound`.
pub struct AccountRequestService {
    requests: Arc<dyn ResourceRepository<AccountRequest>>,
}

impl AccountRequestService {
    pub fn new(requests: Arc<dyn ResourceRepository<AccountRequest>>) -> Self {
        Self { requests }
    }

    /// Validate and store a new request in status `REQUESTED`. The background
    /// poller picks it up from there.
    #[instrument(skip(self, input), fields(requester_id = %input.requester_id))]
    pub async fn submit(&self, input: SubmitAccountRequestInput) -> Result<AccountRequest> {
        validate_account_request(&input)?;

        let request = AccountRequest::new(
            input.requester_id,
            input.account_name,
            input.owner_email,
            input.purpose,
            input.region,
            input.budget,
            input.expires_at,
        );
        let stored = self.requests.create(request).await?;
        info!(request_id = %stored.id, "Account request submitted");
        Ok(stored)
    }

    /// Fetch a request owned by the caller.
    pub async fn get(
        &self,
        requester_id: RequesterId,
        id: AccountRequestId,
    ) -> Result<AccountRequest> {
        let request = self
            .requests
            .find_by_id(*id.as_uuid())
            .await?
            .ok_or_else(|| NimbusError::not_found(RESOURCE, id))?;
        if request.requester_id != requester_id {
            return Err(NimbusError::access_denied(RESOURCE));
        }
        Ok(request)
    }

    /// List the caller's requests, newest first, optionally filtered by
    /// status.
    pub async fn list(
        &self,
        requester_id: RequesterId,
        status: Option<AccountRequestStatus>,
    ) -> Result<Vec<AccountRequest>> {
        let mut requests = self.requests.find_by_owner(*requester_id.as_uuid()).await?;
        if let Some(status) = status {
            requests.retain(|r| r.status == status);
        }
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    /// Cancel a request that has not reached a terminal status.
    ///
    /// Only `REQUESTED` and `CREATING` are cancellable; once guardrailing has
    /// begun the external account exists and the record must be kept.
    #[instrument(skip(self))]
    pub async fn cancel(&self, requester_id: RequesterId, id: AccountRequestId) -> Result<()> {
        let request = self.get(requester_id, id).await?;
        if !request.is_cancellable() {
            return Err(NimbusError::cannot_delete(request.status));
        }
        self.requests.delete(*id.as_uuid()).await?;
        info!(request_id = %id, "Account request cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;

    fn service() -> AccountRequestService {
        AccountRequestService::new(Arc::new(InMemoryRepository::new()))
    }

    fn input(requester_id: RequesterId) -> SubmitAccountRequestInput {
        SubmitAccountRequestInput {
            requester_id,
            account_name: "dev-account".to_string(),
            owner_email: "dev@x.com".to_string(),
            purpose: "development".to_string(),
            region: "us-west-2".to_string(),
            budget: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_submit_starts_requested() {
        let svc = service();
        let requester = RequesterId::new();
        let stored = svc.submit(input(requester)).await.unwrap();
        assert_eq!(stored.status, AccountRequestStatus::Requested);

        let fetched = svc.get(requester, stored.id).await.unwrap();
        assert_eq!(fetched.account_name, "dev-account");
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_input() {
        let svc = service();
        let mut bad = input(RequesterId::new());
        bad.region = "mars-central-1".to_string();
        let err = svc.submit(bad).await.unwrap_err();
        assert!(matches!(err, NimbusError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let svc = service();
        let err = svc
            .get(RequesterId::new(), AccountRequestId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, NimbusError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_foreign_is_access_denied() {
        let svc = service();
        let owner = RequesterId::new();
        let stored = svc.submit(input(owner)).await.unwrap();

        let err = svc.get(RequesterId::new(), stored.id).await.unwrap_err();
        assert!(matches!(err, NimbusError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let svc = service();
        let requester = RequesterId::new();
        svc.submit(input(requester)).await.unwrap();
        svc.submit(input(requester)).await.unwrap();

        let all = svc.list(requester, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let ready = svc
            .list(requester, Some(AccountRequestStatus::Ready))
            .await
            .unwrap();
        assert!(ready.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_requested_deletes() {
        let svc = service();
        let requester = RequesterId::new();
        let stored = svc.submit(input(requester)).await.unwrap();

        svc.cancel(requester, stored.id).await.unwrap();
        let err = svc.get(requester, stored.id).await.unwrap_err();
        assert!(matches!(err, NimbusError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_cancel_ready_is_rejected() {
        let repo = Arc::new(InMemoryRepository::new());
        let svc = AccountRequestService::new(repo.clone());
        let requester = RequesterId::new();
        let stored = svc.submit(input(requester)).await.unwrap();

        let mut ready = stored.clone();
        ready.status = AccountRequestStatus::Ready;
        repo.update(*stored.id.as_uuid(), ready).await.unwrap();

        let err = svc.cancel(requester, stored.id).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot delete resource in status READY"
        );
    }
}
