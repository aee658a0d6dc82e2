//! [`ResourceClient`] backed by the real AWS services

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::error::AwsError;
use crate::aws::glue::{CrawlerDefinition, GlueClient};
use crate::aws::iam::IamClient;
use crate::aws::s3::S3Client;
use crate::resource::{RemoteId, ResourceClient, ResourceSpec, StartOutcome, keys};
use chrono::Utc;
use datalake_common::{JobState, ResourceKind, tags};
use tracing::warn;

/// Routes each resource kind to the service that owns it
#[derive(Clone)]
pub struct AwsResources {
    s3: S3Client,
    glue: GlueClient,
    iam: IamClient,
}

impl FromAwsContext for AwsResources {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            s3: S3Client::from_context(ctx),
            glue: GlueClient::from_context(ctx),
            iam: IamClient::from_context(ctx),
        }
    }
}

impl AwsResources {
    pub fn s3(&self) -> &S3Client {
        &self.s3
    }

    pub fn glue(&self) -> &GlueClient {
        &self.glue
    }

    pub fn iam(&self) -> &IamClient {
        &self.iam
    }
}

fn required<'a>(spec: &'a ResourceSpec, key: &str) -> Result<&'a str, AwsError> {
    spec.config_value(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AwsError::Validation(format!("{spec} is missing '{key}'")))
}

impl ResourceClient for AwsResources {
    async fn find(&self, spec: &ResourceSpec) -> Result<Option<RemoteId>, AwsError> {
        let name = spec.name();
        let found = match spec.kind() {
            ResourceKind::Bucket => self.s3.bucket_exists(name).await?,
            ResourceKind::Database => self.glue.database_exists(name).await?,
            ResourceKind::Crawler => self.glue.crawler_exists(name).await?,
            ResourceKind::Role => return Ok(self.iam.get_role_arn(name).await?.map(RemoteId::new)),
        };
        Ok(found.then(|| RemoteId::new(name)))
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<RemoteId, AwsError> {
        let name = spec.name();
        match spec.kind() {
            ResourceKind::Bucket => {
                let region = spec.config_value(keys::REGION).unwrap_or(self.s3.region());
                self.s3.create_bucket(name, region).await?;
                // The bucket is usable without tags
                if let Err(e) = self.s3.tag_bucket(name, &tags::standard_tags(Utc::now())).await {
                    warn!(bucket = %name, error = %e, "Failed to tag bucket");
                }
                Ok(RemoteId::new(name))
            }
            ResourceKind::Database => {
                let description = spec.config_value(keys::DESCRIPTION).unwrap_or_default();
                self.glue.create_database(name, description).await?;
                Ok(RemoteId::new(name))
            }
            ResourceKind::Role => {
                let trust_service = required(spec, keys::TRUST_SERVICE)?;
                let policies = spec.config_list(keys::MANAGED_POLICY_ARNS);
                let arn = self.iam.create_role(name, trust_service, &policies).await?;
                Ok(RemoteId::new(arn))
            }
            ResourceKind::Crawler => {
                let database = spec
                    .parent_ref()
                    .ok_or_else(|| AwsError::Validation(format!("{spec} has no database")))?;
                self.glue
                    .create_crawler(CrawlerDefinition {
                        name,
                        database,
                        role_arn: required(spec, keys::ROLE_ARN)?,
                        source_path: required(spec, keys::SOURCE_PATH)?,
                        table_prefix: spec.config_value(keys::TABLE_PREFIX).filter(|p| !p.is_empty()),
                    })
                    .await?;
                Ok(RemoteId::new(name))
            }
        }
    }

    async fn start_job(&self, job_name: &str) -> Result<StartOutcome, AwsError> {
        self.glue.start_crawler(job_name).await
    }

    async fn get_status(&self, job_name: &str) -> Result<JobState, AwsError> {
        self.glue.crawler_state(job_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_config() {
        let spec = ResourceSpec::crawler("c", "db", "", "s3://lake/raw/", "");
        assert_eq!(required(&spec, keys::SOURCE_PATH).unwrap(), "s3://lake/raw/");
        let err = required(&spec, keys::ROLE_ARN).unwrap_err();
        assert!(matches!(err, AwsError::Validation(ref m) if m.contains("role_arn")));
    }
}
