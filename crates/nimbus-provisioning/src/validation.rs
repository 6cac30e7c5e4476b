//! Creation-time validation
//!
//! Runs once at submission, before a resource enters the repository. Every
//! violation is collected and returned together; nothing short-circuits on
//! the first failure. Transition legality is a separate concern handled by
//! the lifecycle module.

use chrono::{Duration, Utc};

use nimbus_core::{FieldViolation, NimbusError};

use crate::model::EnvironmentParams;
use crate::services::{LinkAccountInput, SubmitAccountRequestInput, SubmitEnvironmentInput};

/// Regions a resource may be provisioned into.
pub const ALLOWED_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "eu-central-1",
    "ap-southeast-1",
    "ap-northeast-1",
];

const NAME_MIN: usize = 3;
const NAME_MAX: usize = 100;
const MAX_INSTANCES_CEILING: u32 = 100;
const ACCOUNT_TTL_MAX_DAYS: i64 = 90;

/// Validate an account request submission.
pub fn validate_account_request(input: &SubmitAccountRequestInput) -> Result<(), NimbusError> {
    let mut violations = Vec::new();

    check_name(&mut violations, "accountName", &input.account_name);
    check_email(&mut violations, "email", &input.owner_email);
    check_region(&mut violations, "region", &input.region);

    if input.purpose.trim().is_empty() {
        violations.push(FieldViolation::new("purpose", "purpose is required"));
    }

    if let Some(budget) = &input.budget {
        if budget.amount_usd < 0.0 {
            violations.push(FieldViolation::new(
                "budgetAmountUsd",
                "budget amount cannot be negative",
            ));
        }
        if budget.alert_threshold_percent == 0 || budget.alert_threshold_percent > 100 {
            violations.push(FieldViolation::new(
                "alertThresholdPercent",
                "alert threshold must be between 1 and 100",
            ));
        }
        for region in &budget.allowed_regions {
            if !ALLOWED_REGIONS.contains(&region.as_str()) {
                violations.push(FieldViolation::new(
                    "allowedRegions",
                    format!("unknown region '{region}'"),
                ));
            }
        }
    }

    if let Some(expires_at) = input.expires_at {
        let now = Utc::now();
        if expires_at <= now {
            violations.push(FieldViolation::new("expiresAt", "TTL must be in the future"));
        } else if expires_at > now + Duration::days(ACCOUNT_TTL_MAX_DAYS) {
            violations.push(FieldViolation::new(
                "expiresAt",
                format!("TTL cannot exceed {ACCOUNT_TTL_MAX_DAYS} days"),
            ));
        }
    }

    finish(violations)
}

/// Validate an environment submission.
pub fn validate_environment(input: &SubmitEnvironmentInput) -> Result<(), NimbusError> {
    let mut violations = Vec::new();

    check_name(&mut violations, "name", &input.name);
    check_region(&mut violations, "region", &input.region);

    if input.template_id.trim().is_empty() {
        violations.push(FieldViolation::new("templateId", "template id is required"));
    }
    if !is_semver(&input.template_version) {
        violations.push(FieldViolation::new(
            "templateVersion",
            format!(
                "'{}' is not a semantic version (expected MAJOR.MINOR.PATCH)",
                input.template_version
            ),
        ));
    }

    check_scaling(
        &mut violations,
        input.enable_auto_scaling,
        input.min_instances,
        input.max_instances,
    );

    if let Some(expires_at) = input.expires_at {
        if expires_at <= Utc::now() {
            violations.push(FieldViolation::new("expiresAt", "TTL must be in the future"));
        }
    }

    finish(violations)
}

/// Validate a replacement parameter set for an existing environment.
///
/// Identity fields (name, template) are immutable after creation, so only the
/// mutable parameters are checked here.
pub fn validate_environment_params(params: &EnvironmentParams) -> Result<(), NimbusError> {
    let mut violations = Vec::new();

    check_region(&mut violations, "region", &params.region);
    check_scaling(
        &mut violations,
        params.enable_auto_scaling,
        params.min_instances,
        params.max_instances,
    );

    if let Some(expires_at) = params.expires_at {
        if expires_at <= Utc::now() {
            violations.push(FieldViolation::new("expiresAt", "TTL must be in the future"));
        }
    }

    finish(violations)
}

/// Validate a link-account submission.
pub fn validate_link_account(input: &LinkAccountInput) -> Result<(), NimbusError> {
    let mut violations = Vec::new();

    check_name(&mut violations, "displayName", &input.display_name);
    check_email(&mut violations, "ownerEmail", &input.owner_email);

    match parse_role_arn(&input.role_arn) {
        Some(embedded_account) => {
            if embedded_account != input.account_id.as_str() {
                violations.push(FieldViolation::new(
                    "roleArn",
                    format!(
                        "role ARN account {} does not match account id {}",
                        embedded_account, input.account_id
                    ),
                ));
            }
        }
        None => {
            violations.push(FieldViolation::new(
                "roleArn",
                "role ARN must have the form arn:aws:iam::<12 digits>:role/<name>",
            ));
        }
    }

    finish(violations)
}

fn finish(violations: Vec<FieldViolation>) -> Result<(), NimbusError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(NimbusError::Validation { violations })
    }
}

fn check_name(violations: &mut Vec<FieldViolation>, field: &str, value: &str) {
    let len = value.chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&len) {
        violations.push(FieldViolation::new(
            field,
            format!("must be between {NAME_MIN} and {NAME_MAX} characters"),
        ));
    }
}

fn check_email(violations: &mut Vec<FieldViolation>, field: &str, value: &str) {
    if !is_rfc_shaped_email(value) {
        violations.push(FieldViolation::new(
            field,
            format!("'{value}' is not a valid email address"),
        ));
    }
}

fn check_scaling(
    violations: &mut Vec<FieldViolation>,
    enabled: bool,
    min_instances: Option<u32>,
    max_instances: Option<u32>,
) {
    if !enabled {
        return;
    }
    match (min_instances, max_instances) {
        (Some(min), Some(max)) => {
            if min < 1 {
                violations.push(FieldViolation::new(
                    "minInstances",
                    "minInstances must be at least 1",
                ));
            }
            if min > max {
                violations.push(FieldViolation::new(
                    "minInstances",
                    "minInstances cannot exceed maxInstances",
                ));
            }
            if max > MAX_INSTANCES_CEILING {
                violations.push(FieldViolation::new(
                    "maxInstances",
                    format!("maxInstances cannot exceed {MAX_INSTANCES_CEILING}"),
                ));
            }
        }
        _ => {
            violations.push(FieldViolation::new(
                "minInstances",
                "autoscaling requires both minInstances and maxInstances",
            ));
        }
    }
}

fn check_region(violations: &mut Vec<FieldViolation>, field: &str, value: &str) {
    if !ALLOWED_REGIONS.contains(&value) {
        violations.push(FieldViolation::new(
            field,
            format!("'{value}' is not an allowed region"),
        ));
    }
}

/// Shape check only: one `@`, non-empty local part, domain with a dot and no
/// leading/trailing dot. Deliverability is the mail system's problem.
fn is_rfc_shaped_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || value.contains(char::is_whitespace) {
        return false;
    }
    domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// Strict MAJOR.MINOR.PATCH with numeric components.
fn is_semver(value: &str) -> bool {
    let parts: Vec<&str> = value.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

/// Parse `arn:aws:iam::<12 digits>:role/<name>`, returning the embedded
/// account id on success.
fn parse_role_arn(arn: &str) -> Option<&str> {
    let rest = arn.strip_prefix("arn:aws:iam::")?;
    let (account, role_part) = rest.split_once(':')?;
    if account.len() != 12 || !account.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let role_name = role_part.strip_prefix("role/")?;
    if role_name.is_empty() {
        return None;
    }
    Some(account)
}
