//! Shared test utilities for the datalake crates
//!
//! Helpers for integration tests that talk to real AWS services.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and unique resource names

pub mod aws;

// Re-export commonly used items
pub use aws::{get_test_region, test_bucket_name, test_name, test_run_id};
