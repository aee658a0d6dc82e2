//! AWS error classification
//!
//! Provides typed errors for AWS SDK operations using the error code
//! reported by the service instead of string matching on Debug output.

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use datalake_common::UnrecognizedState;
use thiserror::Error;

/// AWS error categories
///
/// Everything except [`AwsError::NotFound`] is a service error: the remote
/// side rejected the request or answered with something unusable.
#[derive(Debug, Error)]
pub enum AwsError {
    /// Resource was not found (a normal answer to an existence check)
    #[error("Resource not found: {resource_type} '{resource_id}'")]
    NotFound {
        resource_type: &'static str,
        resource_id: String,
    },

    /// Resource already exists
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Job is already running
    #[error("Job is already running: {0}")]
    AlreadyRunning(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    Throttled(String),

    /// Request could not be built from the given inputs
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Service answered with something we cannot interpret
    #[error("Unexpected response: {0}")]
    Unexpected(String),

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    /// Check if this is an "already exists" error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, AwsError::AlreadyExists(_))
    }

    /// Check if this is an "already running" error
    pub fn is_already_running(&self) -> bool {
        matches!(self, AwsError::AlreadyRunning(_))
    }

    /// Error code reported by the service, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            AwsError::Sdk { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Get a user-friendly suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            AwsError::Sdk { code: Some(c), .. } => suggestion_for_code(c),
            AwsError::Throttled(_) => suggestion_for_code("Throttling"),
            _ => None,
        }
    }
}

impl From<UnrecognizedState> for AwsError {
    fn from(err: UnrecognizedState) -> Self {
        AwsError::Unexpected(err.to_string())
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "NoSuchBucket",
    "NoSuchKey",
    "NotFound",
    "NoSuchEntity",
    "EntityNotFoundException",
];

/// Known AWS error codes for "already exists" conditions
const ALREADY_EXISTS_CODES: &[&str] = &[
    "BucketAlreadyOwnedByYou",
    "EntityAlreadyExists",
    "AlreadyExistsException",
];

/// Known AWS error codes for a job that is already running
const ALREADY_RUNNING_CODES: &[&str] = &["CrawlerRunningException"];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "SlowDown",
];

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound {
            resource_type: "resource",
            resource_id: message,
        },
        Some(c) if ALREADY_EXISTS_CODES.contains(&c) => AwsError::AlreadyExists(message),
        Some(c) if ALREADY_RUNNING_CODES.contains(&c) => AwsError::AlreadyRunning(message),
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled(message),
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify any SDK operation error through its error metadata.
///
/// Errors without a service message (timeouts, dispatch failures) keep the
/// SDK's full display context as the message.
pub fn classify_sdk_error<E>(err: &E) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let fallback = DisplayErrorContext(err).to_string();
    classify_aws_error(err.code(), Some(err.message().unwrap_or(fallback.as_str())))
}

/// Error code to user-friendly suggestion mapping
const SUGGESTIONS: &[(&str, &str)] = &[
    (
        "AccessDenied",
        "Check that the credentials in use allow this action (AWS_PROFILE or AWS_ACCESS_KEY_ID).",
    ),
    (
        "AccessDeniedException",
        "Check that the credentials in use allow this action (AWS_PROFILE or AWS_ACCESS_KEY_ID).",
    ),
    (
        "BucketAlreadyExists",
        "Bucket names are global and this one belongs to another account. Choose another name.",
    ),
    (
        "InvalidBucketName",
        "Bucket names must be 3-63 lowercase letters, digits, dots or hyphens.",
    ),
    (
        "IllegalLocationConstraintException",
        "The bucket region does not match the configured AWS region.",
    ),
    (
        "InvalidInputException",
        "The role may not be usable by Glue yet. Wait for IAM propagation and run again.",
    ),
    (
        "Throttling",
        "AWS API rate limit hit. Wait a moment and run again.",
    ),
    (
        "ThrottlingException",
        "AWS API rate limit hit. Wait a moment and run again.",
    ),
];

/// Get a user-friendly suggestion for a known error code.
fn suggestion_for_code(code: &str) -> Option<String> {
    SUGGESTIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, s)| (*s).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        for code in NOT_FOUND_CODES {
            let err = classify_aws_error(Some(code), Some("some message"));
            assert!(err.is_not_found(), "Expected NotFound for code: {code}");
        }
    }

    #[test]
    fn already_exists_codes() {
        for code in ALREADY_EXISTS_CODES {
            let err = classify_aws_error(Some(code), Some("msg"));
            assert!(
                err.is_already_exists(),
                "Expected AlreadyExists for code: {code}"
            );
        }
    }

    #[test]
    fn crawler_running_is_already_running() {
        let err = classify_aws_error(Some("CrawlerRunningException"), Some("busy"));
        assert!(err.is_already_running());
        assert!(!err.is_not_found());
    }

    #[test]
    fn throttling_codes() {
        for code in THROTTLING_CODES {
            let err = classify_aws_error(Some(code), Some("msg"));
            assert!(matches!(err, AwsError::Throttled(_)), "code: {code}");
            assert!(err.suggestion().is_some());
        }
    }

    #[test]
    fn foreign_bucket_is_a_service_error() {
        let err = classify_aws_error(Some("BucketAlreadyExists"), Some("taken"));
        assert!(!err.is_already_exists());
        assert_eq!(err.code(), Some("BucketAlreadyExists"));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn unknown_and_missing_codes() {
        let err = classify_aws_error(Some("SomeNewError"), Some("details"));
        assert!(matches!(err, AwsError::Sdk { .. }));
        assert!(err.suggestion().is_none());

        let err2 = classify_aws_error(None, None);
        assert!(matches!(err2, AwsError::Sdk { code: None, ref message } if message == "Unknown error"));
    }

    #[test]
    fn unrecognized_state_is_unexpected() {
        let err: AwsError = UnrecognizedState("PAUSED".to_string()).into();
        assert!(matches!(err, AwsError::Unexpected(ref m) if m.contains("PAUSED")));
    }

    #[test]
    fn suggestions_for_known_codes() {
        for (code, _) in SUGGESTIONS {
            assert!(
                suggestion_for_code(code).is_some(),
                "No suggestion for code: {code}"
            );
        }
        assert!(suggestion_for_code("SomeUnknownCode").is_none());
    }
}
