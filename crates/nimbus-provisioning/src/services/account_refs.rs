//! Account reference service
//!
//! Linking pre-existing accounts and reading back both linked and managed
//! references. Managed references are created by the reconciliation engine,
//! never through this service.

use std::sync::Arc;

use tracing::{info, instrument};

use nimbus_core::{AccountRefId, NimbusError, RequesterId, Result};

use crate::model::{AccountRefKind, AwsAccountRef};
use crate::repository::ResourceRepository;
use crate::validation::validate_link_account;

use super::LinkAccountInput;

const RESOURCE: &str = "AccountRef";

/// Link and inspect AWS account references.
pub struct AccountRefService {
    refs: Arc<dyn ResourceRepository<AwsAccountRef>>,
}

impl AccountRefService {
    pub fn new(refs: Arc<dyn ResourceRepository<AwsAccountRef>>) -> Self {
        Self { refs }
    }

    /// Link an existing account. The role ARN must embed the same account id
    /// being linked; the reference starts in status `linked` with no
    /// guardrails.
    #[instrument(skip(self, input), fields(owner_id = %input.owner_id))]
    pub async fn link(&self, input: LinkAccountInput) -> Result<AwsAccountRef> {
        validate_link_account(&input)?;

        for existing in self.refs.find_by_owner(*input.owner_id.as_uuid()).await? {
            if existing.account_id == input.account_id {
                return Err(NimbusError::IllegalState {
                    message: format!("Account {} is already linked", input.account_id),
                });
            }
        }

        let account_ref = AwsAccountRef::new(
            input.account_id,
            input.display_name,
            input.role_arn,
            input.owner_id,
            input.owner_email,
            AccountRefKind::Linked,
        );
        let stored = self.refs.create(account_ref).await?;
        info!(ref_id = %stored.id, account_id = %stored.account_id, "Account linked");
        Ok(stored)
    }

    /// Fetch a reference owned by the caller.
    pub async fn get(&self, requester_id: RequesterId, id: AccountRefId) -> Result<AwsAccountRef> {
        let account_ref = self
            .refs
            .find_by_id(*id.as_uuid())
            .await?
            .ok_or_else(|| NimbusError::not_found(RESOURCE, id))?;
        if account_ref.owner_id != requester_id {
            return Err(NimbusError::access_denied(RESOURCE));
        }
        Ok(account_ref)
    }

    /// List the caller's references, newest first.
    pub async fn list(&self, requester_id: RequesterId) -> Result<Vec<AwsAccountRef>> {
        let mut refs = self.refs.find_by_owner(*requester_id.as_uuid()).await?;
        refs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(refs)
    }
}
