use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const RESULT_MESSAGE_PREFIX: &str = "Created and attached policy: ";

/// Provisioning input as delivered by the invocation event.
///
/// Every field is required. Scalars are taken by their textual form so an
/// account ID sent as a JSON number is accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRequest {
    #[serde(deserialize_with = "deserialize_text")]
    pub principal_account_id: String,
    #[serde(deserialize_with = "deserialize_text")]
    pub external_id: String,
    #[serde(deserialize_with = "deserialize_text")]
    pub role_name: String,
    #[serde(deserialize_with = "deserialize_text")]
    pub policy_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisioningOutcome {
    pub policy_arn: String,
    pub role_arn: String,
}

impl ProvisioningOutcome {
    pub fn result_message(&self) -> String {
        format!(
            "{RESULT_MESSAGE_PREFIX}{} to role: {}",
            self.policy_arn, self.role_arn
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

/// Decodes a request from either a direct invocation payload or an
/// API-Gateway-style `{"body": ...}` envelope.
pub fn decode_request(event: Value) -> Result<ProvisioningRequest, ContractError> {
    let payload = normalize_invocation_event(event)?;
    serde_json::from_value(payload)
        .map_err(|error| ContractError::MalformedRequest(error.to_string()))
}

fn normalize_invocation_event(event: Value) -> Result<Value, ContractError> {
    let Some(object) = event.as_object() else {
        return Err(ContractError::MalformedRequest(
            "request payload must be a JSON object".to_string(),
        ));
    };

    let Some(body) = object.get("body") else {
        return Ok(event);
    };

    match body {
        Value::Null => Ok(json!({})),
        Value::Object(_) => Ok(body.clone()),
        Value::String(text) => serde_json::from_str(text).map_err(|error| {
            ContractError::MalformedRequest(format!("malformed JSON body: {error}"))
        }),
        _ => Err(ContractError::MalformedRequest(
            "request body must be a JSON object".to_string(),
        )),
    }
}

/// Log correlation key for a request. The external ID is left out because it
/// is a shared secret.
pub fn request_fingerprint(request: &ProvisioningRequest) -> String {
    let canonical = json!({
        "policyName": request.policy_name,
        "principalAccountId": request.principal_account_id,
        "roleName": request.role_name,
    });
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string());
    format!("{:x}", hasher.finalize())
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Null => Err(de::Error::custom(
            "expected a string, number, or boolean but found null",
        )),
        Value::Array(_) => Err(de::Error::custom(
            "expected a string, number, or boolean but found an array",
        )),
        Value::Object(_) => Err(de::Error::custom(
            "expected a string, number, or boolean but found an object",
        )),
    }
}
