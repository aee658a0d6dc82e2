//! AWS test utilities
//!
//! Provides region detection and unique names for AWS integration tests.

use chrono::Utc;

/// Region used when neither `AWS_REGION` nor `AWS_DEFAULT_REGION` is set
pub const FALLBACK_TEST_REGION: &str = "us-east-1";

/// Get the AWS region for tests.
///
/// Checks environment variables in order:
/// 1. AWS_REGION
/// 2. AWS_DEFAULT_REGION
/// 3. Falls back to us-east-1
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| FALLBACK_TEST_REGION.to_string())
}

/// Generate a unique run ID for test resources.
///
/// Format: `test-{timestamp_ms}-{counter}`, unique even when tests start
/// in the same millisecond.
///
/// # Example
///
/// ```
/// use datalake_test_utils::aws::test_run_id;
///
/// let run_id = test_run_id();
/// assert!(run_id.starts_with("test-"));
/// ```
pub fn test_run_id() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("test-{ts}-{counter}")
}

/// Unique bucket name, valid under the S3 naming rules
///
/// ```
/// use datalake_test_utils::aws::test_bucket_name;
///
/// assert!(test_bucket_name().starts_with("datalake-test-"));
/// ```
pub fn test_bucket_name() -> String {
    format!("datalake-{}", test_run_id())
}

/// Unique Glue/IAM resource name; Glue names only allow `[a-z0-9_]`
pub fn test_name(kind: &str) -> String {
    format!("datalake_{kind}_{}", test_run_id().replace('-', "_"))
}
