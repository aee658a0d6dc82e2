//! IAM role management for the Glue crawler

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::error::{AwsError, classify_sdk_error};
use aws_sdk_iam::Client;
use aws_sdk_iam::types::Tag;
use chrono::Utc;
use datalake_common::tags;
use tracing::{debug, info};

/// IAM client for managing the crawler role
#[derive(Clone)]
pub struct IamClient {
    client: Client,
}

/// Trust policy allowing `service` to assume the role
pub fn trust_policy(service: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": {
                    "Service": service
                },
                "Action": "sts:AssumeRole"
            }
        ]
    })
    .to_string()
}

impl FromAwsContext for IamClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.iam_client(),
        }
    }
}

impl IamClient {
    /// ARN of a role, `None` if it does not exist
    pub async fn get_role_arn(&self, role_name: &str) -> Result<Option<String>, AwsError> {
        match self.client.get_role().role_name(role_name).send().await {
            Ok(response) => Ok(response.role().map(|role| role.arn().to_string())),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_entity_exception()) =>
            {
                Ok(None)
            }
            Err(err) => Err(classify_sdk_error(&err)),
        }
    }

    /// Create a role assumable by `trust_service` and attach managed policies.
    ///
    /// Returns the role ARN. Attachment happens after creation; if it fails
    /// the role is left in place without all of its policies.
    pub async fn create_role(
        &self,
        role_name: &str,
        trust_service: &str,
        managed_policy_arns: &[&str],
    ) -> Result<String, AwsError> {
        info!(role_name = %role_name, trust_service = %trust_service, "Creating IAM role");

        let mut request = self
            .client
            .create_role()
            .role_name(role_name)
            .assume_role_policy_document(trust_policy(trust_service))
            .description(format!("Role assumed by {trust_service} for the data lake"));
        for (key, value) in tags::standard_tags(Utc::now()) {
            request = request.tags(
                Tag::builder()
                    .key(key)
                    .value(value)
                    .build()
                    .map_err(|e| AwsError::Validation(format!("Failed to build IAM tag: {e}")))?,
            );
        }

        let response = request.send().await.map_err(|e| classify_sdk_error(&e))?;
        let arn = response
            .role()
            .map(|role| role.arn().to_string())
            .ok_or_else(|| AwsError::Unexpected(format!("CreateRole returned no role for '{role_name}'")))?;

        debug!(role_name = %role_name, arn = %arn, "IAM role created");

        for policy_arn in managed_policy_arns {
            self.client
                .attach_role_policy()
                .role_name(role_name)
                .policy_arn(*policy_arn)
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))?;
            debug!(role_name = %role_name, policy_arn = %policy_arn, "Managed policy attached");
        }

        info!(role_name = %role_name, policies = managed_policy_arns.len(), "IAM role ready");
        Ok(arn)
    }
}
