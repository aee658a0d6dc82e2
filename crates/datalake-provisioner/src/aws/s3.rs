//! S3 bucket and object management

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::error::{AwsError, classify_sdk_error};
use crate::lifecycle::LifecycleRule;
use anyhow::{Context, Result};
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLifecycleConfiguration, BucketLocationConstraint, CreateBucketConfiguration,
    ExpirationStatus, LifecycleExpiration, LifecycleRuleFilter, Tag, Tagging, Transition,
    TransitionStorageClass,
};
use std::path::Path;
use tracing::{debug, info};

/// Region in which buckets are created without a location constraint
const DEFAULT_LOCATION: &str = "us-east-1";

/// S3 client for the lake bucket
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    region: String,
}

impl FromAwsContext for S3Client {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.s3_client(),
            region: ctx.region().to_string(),
        }
    }
}

impl S3Client {
    /// Region the client talks to
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Check whether a bucket exists and is reachable with the current credentials.
    ///
    /// A bucket owned by another account answers 403, which is surfaced as an
    /// error rather than reported as absent.
    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool, AwsError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => match classify_sdk_error(&err) {
                e if e.is_not_found() => Ok(false),
                e => Err(e),
            },
        }
    }

    /// Create a bucket in `region`
    pub async fn create_bucket(&self, bucket: &str, region: &str) -> Result<(), AwsError> {
        info!(bucket = %bucket, region = %region, "Creating S3 bucket");

        let mut request = self.client.create_bucket().bucket(bucket);
        // us-east-1 rejects an explicit location constraint
        if region != DEFAULT_LOCATION {
            let config = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region))
                .build();
            request = request.create_bucket_configuration(config);
        }

        request.send().await.map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    /// Replace the bucket's tag set
    pub async fn tag_bucket(&self, bucket: &str, tags: &[(&str, String)]) -> Result<(), AwsError> {
        let tag_set = tags
            .iter()
            .map(|(key, value)| {
                Tag::builder()
                    .key(*key)
                    .value(value)
                    .build()
                    .map_err(|e| AwsError::Validation(format!("Failed to build S3 tag: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let tagging = Tagging::builder()
            .set_tag_set(Some(tag_set))
            .build()
            .map_err(|e| AwsError::Validation(format!("Failed to build S3 tagging: {e}")))?;

        self.client
            .put_bucket_tagging()
            .bucket(bucket)
            .tagging(tagging)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        debug!(bucket = %bucket, count = tags.len(), "Bucket tagged");
        Ok(())
    }

    /// Create an empty object, used as a folder marker
    pub async fn put_empty_object(&self, bucket: &str, key: &str) -> Result<(), AwsError> {
        debug!(bucket = %bucket, key = %key, "Creating folder marker");

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from_static(b""))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        Ok(())
    }

    /// Upload a local file to S3
    pub async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        debug!(bucket = %bucket, key = %key, path = %path.display(), "Uploading file");

        let body = ByteStream::from_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))
            .with_context(|| format!("Failed to upload s3://{bucket}/{key}"))?;

        Ok(())
    }

    /// List every key under `prefix`, following continuation tokens
    pub async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, AwsError> {
        let mut keys = Vec::new();
        let mut continuation_token = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket).prefix(prefix);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| classify_sdk_error(&e))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        debug!(bucket = %bucket, prefix = %prefix, count = keys.len(), "Listed keys");
        Ok(keys)
    }

    /// Replace the bucket's lifecycle configuration with `rules`
    pub async fn put_lifecycle(&self, bucket: &str, rules: &[LifecycleRule]) -> Result<(), AwsError> {
        let rules = rules.iter().map(to_s3_rule).collect::<Result<Vec<_>, _>>()?;
        let count = rules.len();
        let configuration = BucketLifecycleConfiguration::builder()
            .set_rules(Some(rules))
            .build()
            .map_err(|e| AwsError::Validation(format!("Failed to build lifecycle configuration: {e}")))?;

        self.client
            .put_bucket_lifecycle_configuration()
            .bucket(bucket)
            .lifecycle_configuration(configuration)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        info!(bucket = %bucket, rules = count, "Lifecycle configuration applied");
        Ok(())
    }
}

fn to_s3_rule(rule: &LifecycleRule) -> Result<aws_sdk_s3::types::LifecycleRule, AwsError> {
    let status = if rule.enabled {
        ExpirationStatus::Enabled
    } else {
        ExpirationStatus::Disabled
    };

    let mut builder = aws_sdk_s3::types::LifecycleRule::builder()
        .id(&rule.id)
        .status(status)
        .filter(LifecycleRuleFilter::builder().prefix(&rule.prefix).build());

    if let Some(transition) = rule.transition {
        builder = builder.transitions(
            Transition::builder()
                .days(days(transition.days)?)
                .storage_class(TransitionStorageClass::from(transition.storage_class.as_ref()))
                .build(),
        );
    }
    if let Some(expiration_days) = rule.expiration_days {
        builder = builder.expiration(
            LifecycleExpiration::builder()
                .days(days(expiration_days)?)
                .build(),
        );
    }

    builder
        .build()
        .map_err(|e| AwsError::Validation(format!("Failed to build lifecycle rule '{}': {e}", rule.id)))
}

fn days(days: u32) -> Result<i32, AwsError> {
    i32::try_from(days).map_err(|_| AwsError::Validation(format!("day count {days} out of range")))
}
