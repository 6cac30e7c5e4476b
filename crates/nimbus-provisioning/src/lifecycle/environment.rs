//! Team environment state machine
//!
//! REQUESTED -> VALIDATING -> CREATING -> READY, with update, pause/resume and
//! delete cycles from READY, retry/delete from ERROR, ERROR reachable from any
//! non-terminal status and DELETED terminal.

use crate::model::{EnvironmentHealth, EnvironmentStatus, TeamEnvironment};

use super::{TransitionContext, TransitionError};

/// Compute the successor snapshot for a status change.
///
/// Side effects encoded by the machine:
/// - entering `Ready` sets health to healthy and stamps `last_reconciled_at`
/// - entering `Paused` clears health
/// - entering `Error` records the context's failure text
/// - leaving `Error` (retry via `Updating`, or `Deleting`) clears it
pub fn transition(
    environment: &TeamEnvironment,
    target: EnvironmentStatus,
    ctx: &TransitionContext,
) -> Result<TeamEnvironment, TransitionError> {
    if !environment.status.allowed_targets().contains(&target) {
        return Err(TransitionError::InvalidTransition {
            current: environment.status.to_string(),
            target: target.to_string(),
        });
    }

    let mut next = environment.clone();
    next.status = target;
    next.updated_at = ctx.now;

    match target {
        EnvironmentStatus::Ready => {
            next.health = Some(EnvironmentHealth::Healthy);
            next.last_reconciled_at = Some(ctx.now);
            next.error_message = None;
        }
        EnvironmentStatus::Paused => {
            next.health = None;
            next.error_message = None;
        }
        EnvironmentStatus::Error => {
            next.error_message = Some(
                ctx.error_message
                    .clone()
                    .unwrap_or_else(|| "reconciliation failed".to_string()),
            );
        }
        _ => {
            next.error_message = None;
        }
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnvironmentParams, EnvironmentSize};
    use nimbus_core::{RequesterId, TeamId};

    fn environment_in(status: EnvironmentStatus) -> TeamEnvironment {
        let params = EnvironmentParams {
            size: EnvironmentSize::Medium,
            region: "eu-west-1".to_string(),
            enable_auto_scaling: false,
            min_instances: None,
            max_instances: None,
            expires_at: None,
            enable_monitoring: true,
            enable_backups: true,
        };
        let mut env = TeamEnvironment::new(
            TeamId::new(),
            "checkout-staging",
            "web-service",
            "1.4.0",
            "111111111111".parse().unwrap(),
            params,
            RequesterId::new(),
        );
        env.status = status;
        env
    }

    #[test]
    fn test_create_path_sets_health_and_stamp() {
        let ctx = TransitionContext::new();
        let env = environment_in(EnvironmentStatus::Creating);

        let ready = transition(&env, EnvironmentStatus::Ready, &ctx).unwrap();
        assert_eq!(ready.health, Some(EnvironmentHealth::Healthy));
        assert_eq!(ready.last_reconciled_at, Some(ctx.now));
    }

    #[test]
    fn test_pause_clears_health_resume_restores() {
        let ctx = TransitionContext::new();
        let env = environment_in(EnvironmentStatus::Ready);

        let pausing = transition(&env, EnvironmentStatus::Pausing, &ctx).unwrap();
        let paused = transition(&pausing, EnvironmentStatus::Paused, &ctx).unwrap();
        assert!(paused.health.is_none());

        let resuming = transition(&paused, EnvironmentStatus::Resuming, &ctx).unwrap();
        let ready = transition(&resuming, EnvironmentStatus::Ready, &ctx).unwrap();
        assert_eq!(ready.health, Some(EnvironmentHealth::Healthy));
    }

    #[test]
    fn test_error_retry_clears_message() {
        let env = environment_in(EnvironmentStatus::Creating);
        let failed = transition(
            &env,
            EnvironmentStatus::Error,
            &TransitionContext::failure("claim rejected"),
        )
        .unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("claim rejected"));

        let retrying = transition(
            &failed,
            EnvironmentStatus::Updating,
            &TransitionContext::new(),
        )
        .unwrap();
        assert!(retrying.error_message.is_none());
    }

    #[test]
    fn test_deleted_is_terminal() {
        let ctx = TransitionContext::new();
        let env = environment_in(EnvironmentStatus::Deleted);
        for target in EnvironmentStatus::all() {
            assert!(
                transition(&env, *target, &ctx).is_err(),
                "DELETED -> {target} should be rejected"
            );
        }
    }

    #[test]
    fn test_paused_cannot_jump_to_ready() {
        let ctx = TransitionContext::new();
        let env = environment_in(EnvironmentStatus::Paused);
        let err = transition(&env, EnvironmentStatus::Ready, &ctx).unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn test_transition_does_not_mutate_input() {
        let ctx = TransitionContext::new();
        let env = environment_in(EnvironmentStatus::Ready);
        let _ = transition(&env, EnvironmentStatus::Pausing, &ctx).unwrap();
        assert_eq!(env.status, EnvironmentStatus::Ready);
    }
}
