use serde::Serialize;

use crate::contract::ProvisioningRequest;

pub const POLICY_LANGUAGE_VERSION: &str = "2012-10-17";
pub const ASSUME_ROLE_ACTION: &str = "sts:AssumeRole";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TrustPolicyDocument {
    pub version: String,
    pub statement: Vec<TrustStatement>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TrustStatement {
    pub effect: String,
    pub action: String,
    pub principal: TrustPrincipal,
    pub condition: TrustCondition,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TrustPrincipal {
    #[serde(rename = "AWS")]
    pub aws: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TrustCondition {
    #[serde(rename = "StringEquals")]
    pub string_equals: ExternalIdCondition,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExternalIdCondition {
    #[serde(rename = "sts:ExternalId")]
    pub external_id: String,
}

impl TrustPolicyDocument {
    /// Single `Allow` statement letting `principal_account_id` assume the role
    /// when it presents `external_id`.
    pub fn for_external_principal(principal_account_id: &str, external_id: &str) -> Self {
        Self {
            version: POLICY_LANGUAGE_VERSION.to_string(),
            statement: vec![TrustStatement {
                effect: "Allow".to_string(),
                action: ASSUME_ROLE_ACTION.to_string(),
                principal: TrustPrincipal {
                    aws: principal_account_id.to_string(),
                },
                condition: TrustCondition {
                    string_equals: ExternalIdCondition {
                        external_id: external_id.to_string(),
                    },
                },
            }],
        }
    }

    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub fn trust_policy_json(request: &ProvisioningRequest) -> Result<String, serde_json::Error> {
    TrustPolicyDocument::for_external_principal(
        &request.principal_account_id,
        &request.external_id,
    )
    .to_pretty_json()
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn request(principal_account_id: &str, external_id: &str) -> ProvisioningRequest {
        ProvisioningRequest {
            principal_account_id: principal_account_id.to_string(),
            external_id: external_id.to_string(),
            role_name: "AuditRole".to_string(),
            policy_name: "AuditPolicy".to_string(),
        }
    }

    #[test]
    fn matches_fixed_trust_shape() {
        let document = trust_policy_json(&request("123456789012", "abc-ext-id"))
            .expect("trust policy should serialize");
        let parsed: Value = serde_json::from_str(&document).expect("trust policy is valid JSON");

        assert_eq!(
            parsed,
            json!({
                "Version": "2012-10-17",
                "Statement": [
                    {
                        "Effect": "Allow",
                        "Action": "sts:AssumeRole",
                        "Principal": { "AWS": "123456789012" },
                        "Condition": {
                            "StringEquals": { "sts:ExternalId": "abc-ext-id" }
                        }
                    }
                ]
            })
        );
    }

    #[test]
    fn embeds_principal_and_external_id() {
        let document = trust_policy_json(&request("123456789012", "abc-ext-id"))
            .expect("trust policy should serialize");
        let parsed: Value = serde_json::from_str(&document).expect("trust policy is valid JSON");

        let statement = &parsed["Statement"][0];
        assert_eq!(statement["Principal"]["AWS"], "123456789012");
        assert_eq!(
            statement["Condition"]["StringEquals"]["sts:ExternalId"],
            "abc-ext-id"
        );
    }

    #[test]
    fn output_is_pretty_printed() {
        let document = trust_policy_json(&request("1", "x")).expect("trust policy should serialize");
        assert!(document.starts_with("{\n  \"Version\""));
    }

    #[test]
    fn quotes_in_ids_stay_inside_string_values() {
        let document = trust_policy_json(&request("1\"2", "<ext>&"))
            .expect("trust policy should serialize");
        let parsed: Value = serde_json::from_str(&document).expect("trust policy is valid JSON");

        assert_eq!(parsed["Statement"][0]["Principal"]["AWS"], "1\"2");
        assert!(document.contains("<ext>&"));
    }
}
