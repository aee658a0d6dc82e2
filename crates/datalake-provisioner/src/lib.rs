//! datalake-provisioner - Idempotent provisioning of an S3 + Glue data lake
//!
//! Ensures the lake bucket, Glue database, crawler IAM role and Glue crawler
//! exist, then starts the crawler and polls it to a terminal state.
//!
//! ## Modules
//!
//! - [`resource`]: Resource specifications and the [`resource::ResourceClient`] seam
//! - [`ensure`]: Create-if-absent provisioning
//! - [`poller`]: Start a remote job and poll it to completion
//! - [`pipeline`]: Database → role → crawler → run, fail-fast
//! - [`lake`]: Bucket setup, uploads, statistics and lifecycle rules
//! - [`aws`]: S3, Glue and IAM clients

pub mod aws;
pub mod config;
pub mod ensure;
pub mod error;
pub mod lake;
pub mod lifecycle;
pub mod pipeline;
pub mod poller;
pub mod resource;

pub use ensure::ensure;
pub use error::ProvisionError;
pub use pipeline::{Pipeline, PipelineResult, PipelineSpec};
pub use poller::{JobPoller, JobRun, PollConfig};
pub use resource::{RemoteId, ResourceClient, ResourceHandle, ResourceSpec, StartOutcome};
