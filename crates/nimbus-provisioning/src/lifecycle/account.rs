//! Account request state machine
//!
//! REQUESTED -> VALIDATING -> CREATING -> GUARDRAILING -> READY, with FAILED
//! reachable from any non-terminal status. READY and FAILED are terminal.

use nimbus_core::AwsAccountId;

use crate::model::{AccountRequest, AccountRequestStatus};

use super::{TransitionContext, TransitionError};

/// Compute the successor snapshot for a status change.
///
/// Entering `Failed` records the context's failure text (or a generic one);
/// entering any other status clears it. The guard on `Guardrailing` rejects
/// requests whose external account id has not been recorded yet.
pub fn transition(
    request: &AccountRequest,
    target: AccountRequestStatus,
    ctx: &TransitionContext,
) -> Result<AccountRequest, TransitionError> {
    if !request.status.allowed_targets().contains(&target) {
        return Err(TransitionError::InvalidTransition {
            current: request.status.to_string(),
            target: target.to_string(),
        });
    }

    if target == AccountRequestStatus::Guardrailing && request.aws_account_id.is_none() {
        return Err(TransitionError::MissingAwsAccountId);
    }

    let mut next = request.clone();
    next.status = target;
    next.updated_at = ctx.now;
    next.error_message = if target == AccountRequestStatus::Failed {
        Some(
            ctx.error_message
                .clone()
                .unwrap_or_else(|| "provisioning failed".to_string()),
        )
    } else {
        None
    };

    Ok(next)
}

/// Record the external account id on a request.
///
/// Write-once: re-recording the same value is a no-op (status polls are
/// at-least-once), recording a different value is an error.
pub fn record_aws_account_id(
    request: &AccountRequest,
    account_id: AwsAccountId,
) -> Result<AccountRequest, TransitionError> {
    match &request.aws_account_id {
        Some(existing) if *existing == account_id => Ok(request.clone()),
        Some(existing) => Err(TransitionError::AwsAccountIdAlreadySet {
            existing: existing.to_string(),
        }),
        None => {
            let mut next = request.clone();
            next.aws_account_id = Some(account_id);
            next.updated_at = chrono::Utc::now();
            Ok(next)
        }
    }
}
