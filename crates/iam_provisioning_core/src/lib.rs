//! Deterministic IAM provisioning domain primitives.
//!
//! This crate owns the invocation contract, the trust-policy document shape,
//! and loading of the bundled policy document. It intentionally excludes AWS
//! SDK and Lambda runtime concerns.

pub mod contract;
pub mod policy_document;
pub mod trust_policy;
