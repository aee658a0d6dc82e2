//! AWS client modules for the provisioner
//!
//! This module provides wrappers around AWS SDK clients for:
//! - S3: The lake bucket, folder markers, uploads and lifecycle rules
//! - Glue: Catalog database and crawlers
//! - IAM: The role the crawler runs as
//! - resources: The [`crate::resource::ResourceClient`] implementation over all three

pub mod context;
pub mod error;
pub mod glue;
pub mod iam;
pub mod resources;
pub mod s3;

pub use context::{AwsContext, FromAwsContext};
pub use glue::GlueClient;
pub use iam::IamClient;
pub use resources::AwsResources;
pub use s3::S3Client;

// Error handling
pub use error::{AwsError, classify_aws_error, classify_sdk_error};
