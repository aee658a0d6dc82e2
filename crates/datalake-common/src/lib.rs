//! datalake-common - Shared types and utilities
//!
//! Types used by the provisioner that do not need the AWS SDK, kept in a
//! separate crate so they can be unit tested without any cloud setup.
//!
//! ## Modules
//!
//! - [`defaults`]: Default names, prefixes and timings
//! - [`job_state`]: Remote job states, terminal outcomes and status normalization
//! - [`layout`]: Partition keys and folder markers of the lake
//! - [`resource_kind`]: Kinds of provisioned resources
//! - [`tags`]: AWS resource tag constants

pub mod defaults;
pub mod job_state;
pub mod layout;
pub mod resource_kind;
pub mod tags;

// Re-export commonly used types
pub use job_state::{JobOutcome, JobState, UnrecognizedState};
pub use layout::{LayoutError, PartitionPath, Stage};
pub use resource_kind::ResourceKind;
