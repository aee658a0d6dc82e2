//! Resource specifications, handles and the client seam
//!
//! A [`ResourceSpec`] describes what should exist remotely. The
//! [`ResourceClient`] trait is the narrow interface to the services that own
//! those resources; [`crate::ensure`] and [`crate::poller`] only talk to
//! remote state through it.

use crate::aws::AwsError;
use datalake_common::{JobState, ResourceKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Well-known keys of [`ResourceSpec::config`]
pub mod keys {
    /// Human readable description (databases, roles)
    pub const DESCRIPTION: &str = "description";
    /// Region a bucket is created in
    pub const REGION: &str = "region";
    /// Service principal allowed to assume a role
    pub const TRUST_SERVICE: &str = "trust_service";
    /// Comma separated managed policy ARNs attached to a new role
    pub const MANAGED_POLICY_ARNS: &str = "managed_policy_arns";
    /// ARN of the role a crawler runs as
    pub const ROLE_ARN: &str = "role_arn";
    /// S3 path a crawler scans
    pub const SOURCE_PATH: &str = "source_path";
    /// Prefix prepended to tables created by a crawler
    pub const TABLE_PREFIX: &str = "table_prefix";
}

/// Description of a remote resource that should exist
///
/// Immutable once built: the constructors and `with_*` builders consume
/// `self`, and nothing hands out mutable access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSpec {
    kind: ResourceKind,
    name: String,
    parent_ref: Option<String>,
    config: BTreeMap<String, String>,
}

impl ResourceSpec {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            parent_ref: None,
            config: BTreeMap::new(),
        }
    }

    /// S3 bucket in `region`
    pub fn bucket(name: impl Into<String>, region: &str) -> Self {
        Self::new(ResourceKind::Bucket, name).with_config(keys::REGION, region)
    }

    /// Glue database
    pub fn database(name: impl Into<String>, description: &str) -> Self {
        Self::new(ResourceKind::Database, name).with_config(keys::DESCRIPTION, description)
    }

    /// IAM role assumable by `trust_service`, with managed policies attached on creation
    pub fn role(name: impl Into<String>, trust_service: &str, managed_policy_arns: &[&str]) -> Self {
        Self::new(ResourceKind::Role, name)
            .with_config(keys::TRUST_SERVICE, trust_service)
            .with_config(keys::MANAGED_POLICY_ARNS, managed_policy_arns.join(","))
    }

    /// Glue crawler writing into `database`, running as `role_arn`
    pub fn crawler(
        name: impl Into<String>,
        database: &str,
        role_arn: &str,
        source_path: &str,
        table_prefix: &str,
    ) -> Self {
        Self::new(ResourceKind::Crawler, name)
            .with_parent(database)
            .with_config(keys::ROLE_ARN, role_arn)
            .with_config(keys::SOURCE_PATH, source_path)
            .with_config(keys::TABLE_PREFIX, table_prefix)
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_ref = Some(parent.into());
        self
    }

    pub fn with_config(mut self, key: &str, value: impl Into<String>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the resource this one lives in (the database of a crawler)
    pub fn parent_ref(&self) -> Option<&str> {
        self.parent_ref.as_deref()
    }

    pub fn config(&self) -> &BTreeMap<String, String> {
        &self.config
    }

    pub fn config_value(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    /// Comma separated config value split into its non-empty items
    pub fn config_list(&self, key: &str) -> Vec<&str> {
        self.config_value(key)
            .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }
}

impl fmt::Display for ResourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// Remote identifier of a resource: an ARN for roles, the name otherwise
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resource known to exist, as returned by [`crate::ensure::ensure`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceHandle {
    spec: ResourceSpec,
    remote_id: RemoteId,
    existed_before: bool,
}

impl ResourceHandle {
    pub(crate) fn new(spec: ResourceSpec, remote_id: RemoteId, existed_before: bool) -> Self {
        Self {
            spec,
            remote_id,
            existed_before,
        }
    }

    pub fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    pub fn remote_id(&self) -> &RemoteId {
        &self.remote_id
    }

    /// `true` when ensure found the resource instead of creating it
    pub fn existed_before(&self) -> bool {
        self.existed_before
    }
}

/// Result of asking a remote job to start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    /// A new run was started
    Started,
    /// A run was already in progress; it is observed instead
    AlreadyRunning,
}

/// Remote management API for provisioned resources.
///
/// `find`/`exists` answer "not found" with `Ok(None)`/`Ok(false)`; every
/// other failure is an [`AwsError`] and must be surfaced by the caller.
/// `create` changes remote state and must only be called after `find`
/// established that the resource is absent.
#[allow(async_fn_in_trait)] // Used with concrete types only
#[cfg_attr(test, mockall::automock)]
pub trait ResourceClient: Send + Sync {
    /// Look up a resource, returning its remote ID when it exists
    async fn find(&self, spec: &ResourceSpec) -> Result<Option<RemoteId>, AwsError>;

    /// Whether the resource exists
    async fn exists(&self, spec: &ResourceSpec) -> Result<bool, AwsError> {
        Ok(self.find(spec).await?.is_some())
    }

    /// Create a resource that is known to be absent
    async fn create(&self, spec: &ResourceSpec) -> Result<RemoteId, AwsError>;

    /// Start a run of a job resource
    async fn start_job(&self, job_name: &str) -> Result<StartOutcome, AwsError>;

    /// Current state of a job resource
    async fn get_status(&self, job_name: &str) -> Result<JobState, AwsError>;
}
