use std::path::PathBuf;
use std::time::{Duration, Instant};

use iam_provisioning_core::contract::{
    decode_request, request_fingerprint, ContractError, ProvisioningOutcome, ProvisioningRequest,
};
use iam_provisioning_core::policy_document::{
    load_policy_document, resolve_policy_document_path, PolicyDocumentError,
};
use iam_provisioning_core::trust_policy::trust_policy_json;
use serde_json::{json, Value};
use thiserror::Error;

use crate::adapters::event_log::EventLog;
use crate::adapters::iam::{IamGateway, ProviderError};

pub const DEFAULT_POLICY_WAIT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_ROLE_DESCRIPTION: &str = "Created by the IAM provisioning lambda";

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error(transparent)]
    Request(#[from] ContractError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    PolicyDocument(#[from] PolicyDocumentError),
    #[error("failed to serialize trust policy: {0}")]
    TrustPolicy(#[from] serde_json::Error),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStep {
    LoadPolicyDocument,
    BuildTrustPolicy,
    CreatePolicy,
    CreateRole,
    AttachPolicy,
}

impl ProvisioningStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoadPolicyDocument => "load_policy_document",
            Self::BuildTrustPolicy => "build_trust_policy",
            Self::CreatePolicy => "create_policy",
            Self::CreateRole => "create_role",
            Self::AttachPolicy => "attach_policy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningConfig {
    pub policy_document_path: PathBuf,
    pub policy_wait_timeout: Duration,
    pub role_description: String,
    /// Waits for the role to become visible before attaching. Off by default,
    /// which leaves attachment exposed to IAM's eventual consistency.
    pub wait_for_role: bool,
}

impl ProvisioningConfig {
    pub fn from_env() -> Result<Self, ProvisioningError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ProvisioningError> {
        let policy_document_path = resolve_policy_document_path(
            lookup("POLICY_DOCUMENT_PATH").as_deref(),
            lookup("LAMBDA_TASK_ROOT").as_deref(),
        );

        let policy_wait_timeout = match lookup("POLICY_WAIT_TIMEOUT_SECS") {
            None => Duration::from_secs(DEFAULT_POLICY_WAIT_TIMEOUT_SECS),
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ProvisioningError::Config(format!(
                        "POLICY_WAIT_TIMEOUT_SECS must be a positive integer, got '{raw}'"
                    )))
                }
            },
        };

        let role_description = lookup("ROLE_DESCRIPTION")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ROLE_DESCRIPTION.to_string());

        let wait_for_role = match lookup("WAIT_FOR_ROLE") {
            None => false,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "" | "0" | "false" | "no" => false,
                "1" | "true" | "yes" => true,
                _ => {
                    return Err(ProvisioningError::Config(format!(
                        "WAIT_FOR_ROLE must be a boolean, got '{raw}'"
                    )))
                }
            },
        };

        Ok(Self {
            policy_document_path,
            policy_wait_timeout,
            role_description,
            wait_for_role,
        })
    }
}

/// Decodes the invocation event and provisions the role and policy it names.
/// Returns the confirmation message on success.
pub fn handle_provisioning_event(
    event: Value,
    config: &ProvisioningConfig,
    gateway: &impl IamGateway,
    log: &impl EventLog,
) -> Result<String, ProvisioningError> {
    let request = decode_request(event).map_err(|error| {
        log.error("provisioning_rejected", json!({ "error": error.to_string() }));
        error
    })?;

    provision(&request, config, gateway, log).map(|outcome| outcome.result_message())
}

#[derive(Debug, Default)]
struct CreatedResources {
    policy_arn: Option<String>,
    role_arn: Option<String>,
}

#[derive(Debug)]
struct StepFailure {
    step: ProvisioningStep,
    error: ProvisioningError,
}

fn at_step<E: Into<ProvisioningError>>(step: ProvisioningStep) -> impl FnOnce(E) -> StepFailure {
    move |error| StepFailure {
        step,
        error: error.into(),
    }
}

/// Creates the policy, creates the role, and attaches one to the other.
///
/// Any failure stops the sequence. Resources created before the failing step
/// are left in place and named in the `provisioning_failed` log entry.
pub fn provision(
    request: &ProvisioningRequest,
    config: &ProvisioningConfig,
    gateway: &impl IamGateway,
    log: &impl EventLog,
) -> Result<ProvisioningOutcome, ProvisioningError> {
    let started_at = Instant::now();
    let fingerprint = request_fingerprint(request);
    log.info(
        "provisioning_started",
        json!({
            "request_fingerprint": fingerprint.clone(),
            "role_name": request.role_name.clone(),
            "policy_name": request.policy_name.clone(),
        }),
    );

    let mut created = CreatedResources::default();
    match run_steps(request, config, gateway, log, &mut created) {
        Ok(outcome) => {
            log.info(
                "provisioning_completed",
                json!({
                    "request_fingerprint": fingerprint,
                    "policy_arn": outcome.policy_arn.clone(),
                    "role_arn": outcome.role_arn.clone(),
                    "duration_ms": started_at.elapsed().as_millis(),
                }),
            );
            Ok(outcome)
        }
        Err(failure) => {
            log.error(
                "provisioning_failed",
                json!({
                    "request_fingerprint": fingerprint,
                    "step": failure.step.as_str(),
                    "error": failure.error.to_string(),
                    "provider_code": provider_code(&failure.error),
                    "created_policy_arn": created.policy_arn,
                    "created_role_arn": created.role_arn,
                    "duration_ms": started_at.elapsed().as_millis(),
                }),
            );
            Err(failure.error)
        }
    }
}

fn run_steps(
    request: &ProvisioningRequest,
    config: &ProvisioningConfig,
    gateway: &impl IamGateway,
    log: &impl EventLog,
    created: &mut CreatedResources,
) -> Result<ProvisioningOutcome, StepFailure> {
    let policy_document = load_policy_document(&config.policy_document_path)
        .map_err(at_step(ProvisioningStep::LoadPolicyDocument))?;

    let trust_policy =
        trust_policy_json(request).map_err(at_step(ProvisioningStep::BuildTrustPolicy))?;

    let policy_arn = gateway
        .create_policy(&request.policy_name, &policy_document)
        .map_err(at_step(ProvisioningStep::CreatePolicy))?;
    created.policy_arn = Some(policy_arn.clone());
    gateway
        .wait_until_policy_exists(&policy_arn, config.policy_wait_timeout)
        .map_err(at_step(ProvisioningStep::CreatePolicy))?;
    log.info("policy_created", json!({ "policy_arn": policy_arn.clone() }));

    let role_arn = gateway
        .create_role(&request.role_name, &trust_policy, &config.role_description)
        .map_err(at_step(ProvisioningStep::CreateRole))?;
    created.role_arn = Some(role_arn.clone());
    if config.wait_for_role {
        gateway
            .wait_until_role_exists(&request.role_name, config.policy_wait_timeout)
            .map_err(at_step(ProvisioningStep::CreateRole))?;
    }
    log.info("role_created", json!({ "role_arn": role_arn.clone() }));

    gateway
        .attach_role_policy(&request.role_name, &policy_arn)
        .map_err(at_step(ProvisioningStep::AttachPolicy))?;
    log.info(
        "policy_attached",
        json!({
            "policy_arn": policy_arn.clone(),
            "role_name": request.role_name.clone(),
        }),
    );

    Ok(ProvisioningOutcome {
        policy_arn,
        role_arn,
    })
}

fn provider_code(error: &ProvisioningError) -> Option<&str> {
    match error {
        ProvisioningError::Provider(provider) => provider.code.as_deref(),
        _ => None,
    }
}
