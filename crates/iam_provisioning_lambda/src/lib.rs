//! AWS-oriented adapters and handlers for IAM role and policy provisioning.
//!
//! This crate owns runtime integration details (the Lambda handler, the IAM
//! gateway seam, and structured event logging). Request contracts and policy
//! documents live in `iam_provisioning_core`.

pub mod adapters;
pub mod handlers;
