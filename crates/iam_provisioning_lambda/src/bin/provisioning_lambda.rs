use std::future::Future;
use std::time::Duration;

use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_iam::client::Waiters;
use iam_provisioning_lambda::adapters::event_log::TracingEventLog;
use iam_provisioning_lambda::adapters::iam::{
    sdk_provider_error, waiter_provider_error, IamGateway, ProviderError,
};
use iam_provisioning_lambda::handlers::provision::{handle_provisioning_event, ProvisioningConfig};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const FALLBACK_REGION: &str = "us-east-1";

struct AwsIamGateway {
    iam_client: aws_sdk_iam::Client,
}

/// Drives an SDK future to completion from the synchronous gateway seam.
fn block_on<T>(future: impl Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

impl IamGateway for AwsIamGateway {
    fn create_policy(
        &self,
        policy_name: &str,
        policy_document: &str,
    ) -> Result<String, ProviderError> {
        let request = self
            .iam_client
            .create_policy()
            .policy_name(policy_name)
            .policy_document(policy_document);

        let output = block_on(request.send())
            .map_err(|error| sdk_provider_error("create_policy", &error))?;
        output
            .policy()
            .and_then(|policy| policy.arn())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::new("create_policy", "response did not include a policy ARN"))
    }

    fn wait_until_policy_exists(
        &self,
        policy_arn: &str,
        max_wait: Duration,
    ) -> Result<(), ProviderError> {
        let waiter = self
            .iam_client
            .wait_until_policy_exists()
            .policy_arn(policy_arn);

        block_on(waiter.wait(max_wait))
            .map(|_| ())
            .map_err(|error| waiter_provider_error("wait_until_policy_exists", &error))
    }

    fn create_role(
        &self,
        role_name: &str,
        assume_role_policy_document: &str,
        description: &str,
    ) -> Result<String, ProviderError> {
        let request = self
            .iam_client
            .create_role()
            .role_name(role_name)
            .assume_role_policy_document(assume_role_policy_document)
            .description(description);

        let output =
            block_on(request.send()).map_err(|error| sdk_provider_error("create_role", &error))?;
        output
            .role()
            .map(|role| role.arn().to_string())
            .ok_or_else(|| ProviderError::new("create_role", "response did not include a role"))
    }

    fn wait_until_role_exists(
        &self,
        role_name: &str,
        max_wait: Duration,
    ) -> Result<(), ProviderError> {
        let waiter = self.iam_client.wait_until_role_exists().role_name(role_name);

        block_on(waiter.wait(max_wait))
            .map(|_| ())
            .map_err(|error| waiter_provider_error("wait_until_role_exists", &error))
    }

    fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProviderError> {
        let request = self
            .iam_client
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn);

        block_on(request.send())
            .map(|_| ())
            .map_err(|error| sdk_provider_error("attach_role_policy", &error))
    }
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<String, Error> {
    let config = ProvisioningConfig::from_env()?;

    let region = RegionProviderChain::default_provider().or_else(FALLBACK_REGION);
    let aws_config = aws_config::defaults(BehaviorVersion::latest())
        .region(region)
        .load()
        .await;
    let gateway = AwsIamGateway {
        iam_client: aws_sdk_iam::Client::new(&aws_config),
    };
    let log = TracingEventLog::new("provisioning_handler");

    Ok(handle_provisioning_event(
        event.payload,
        &config,
        &gateway,
        &log,
    )?)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        // CloudWatch stamps ingestion time.
        .without_time()
        .with_target(false)
        .init();

    lambda_runtime::run(service_fn(handle_request)).await
}
