use std::fmt::Debug;
use std::time::Duration;

use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_smithy_runtime_api::client::waiters::error::WaiterError;
use thiserror::Error;

/// Failure reported by the IAM service, or by the client while talking to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {message}")]
pub struct ProviderError {
    pub operation: &'static str,
    pub code: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// The IAM operations provisioning needs. Implementations block until the
/// remote call completes.
pub trait IamGateway {
    /// Returns the ARN of the created managed policy.
    fn create_policy(&self, policy_name: &str, policy_document: &str)
        -> Result<String, ProviderError>;

    /// Polls `GetPolicy` until the policy is visible or `max_wait` elapses.
    fn wait_until_policy_exists(
        &self,
        policy_arn: &str,
        max_wait: Duration,
    ) -> Result<(), ProviderError>;

    /// Returns the ARN of the created role.
    fn create_role(
        &self,
        role_name: &str,
        assume_role_policy_document: &str,
        description: &str,
    ) -> Result<String, ProviderError>;

    /// Polls `GetRole` until the role is visible or `max_wait` elapses.
    fn wait_until_role_exists(&self, role_name: &str, max_wait: Duration)
        -> Result<(), ProviderError>;

    fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProviderError>;
}

/// Maps an SDK call failure, preferring the service's own code and message
/// over the client-side error chain.
pub fn sdk_provider_error<E, R>(operation: &'static str, error: &SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: Debug,
{
    let message = error
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(error).to_string());
    let provider_error = ProviderError::new(operation, message);
    match error.code() {
        Some(code) => provider_error.with_code(code),
        None => provider_error,
    }
}

/// Maps a waiter failure. A failed polling request keeps the service's code
/// and message; timeouts and failure states carry the waiter's description.
pub fn waiter_provider_error<O, E>(
    operation: &'static str,
    error: &WaiterError<O, E>,
) -> ProviderError
where
    O: Debug,
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match error {
        WaiterError::OperationFailed(failed) => sdk_provider_error(operation, failed.error()),
        _ => ProviderError::new(operation, DisplayErrorContext(error).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_iam::error::ErrorMetadata;
    use aws_sdk_iam::operation::attach_role_policy::AttachRolePolicyError;
    use aws_sdk_iam::operation::create_policy::CreatePolicyError;

    use super::*;

    #[test]
    fn service_error_keeps_provider_code_and_message() {
        let service_error = CreatePolicyError::generic(
            ErrorMetadata::builder()
                .code("EntityAlreadyExists")
                .message("A policy called AuditPolicy already exists.")
                .build(),
        );
        let error: SdkError<CreatePolicyError, ()> = SdkError::service_error(service_error, ());

        let provider_error = sdk_provider_error("create_policy", &error);

        assert_eq!(provider_error.operation, "create_policy");
        assert_eq!(provider_error.code.as_deref(), Some("EntityAlreadyExists"));
        assert_eq!(
            provider_error.message,
            "A policy called AuditPolicy already exists."
        );
        assert_eq!(
            provider_error.to_string(),
            "create_policy failed: A policy called AuditPolicy already exists."
        );
    }

    #[test]
    fn service_error_without_message_falls_back_to_error_context() {
        let service_error =
            AttachRolePolicyError::generic(ErrorMetadata::builder().code("Throttling").build());
        let error: SdkError<AttachRolePolicyError, ()> =
            SdkError::service_error(service_error, ());

        let provider_error = sdk_provider_error("attach_role_policy", &error);

        assert_eq!(provider_error.code.as_deref(), Some("Throttling"));
        assert_eq!(
            provider_error.message,
            DisplayErrorContext(&error).to_string()
        );
        assert!(!provider_error.message.is_empty());
    }

    #[test]
    fn client_side_failure_has_no_code() {
        let error: SdkError<CreatePolicyError, ()> =
            SdkError::construction_failure("policy name is required");

        let provider_error = sdk_provider_error("create_policy", &error);

        assert_eq!(provider_error.code, None);
        assert!(provider_error
            .message
            .contains("failed to construct request"));
    }
}
