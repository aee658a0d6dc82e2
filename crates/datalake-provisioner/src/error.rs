//! Provisioning errors
//!
//! Fatal conditions of the ensure and poll steps. Expected answers such as
//! "not found", "already running" or a timed out poll are not errors; they
//! are part of the normal results.

use crate::aws::AwsError;
use crate::resource::ResourceSpec;
use datalake_common::ResourceKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A remote call about a resource was rejected
    #[error("{kind} '{name}' could not be provisioned")]
    Service {
        kind: ResourceKind,
        name: String,
        #[source]
        source: AwsError,
    },

    /// The resource appeared between the existence check and the create call
    #[error("{kind} '{name}' was created concurrently by another actor between check and create")]
    CreateRace { kind: ResourceKind, name: String },

    /// The job could not be started
    #[error("failed to start job '{job}'")]
    Start {
        job: String,
        #[source]
        source: AwsError,
    },

    /// The job state could not be read or understood
    #[error("failed to read state of job '{job}'")]
    Status {
        job: String,
        #[source]
        source: AwsError,
    },

    /// A zero interval would never use up the polling budget
    #[error("poll interval for job '{job}' must be greater than zero")]
    ZeroInterval { job: String },

    /// The local wait was cancelled; the remote job is unaffected
    #[error("wait for job '{job}' cancelled, the job keeps running remotely")]
    Cancelled { job: String },
}

impl ProvisionError {
    pub(crate) fn service(spec: &ResourceSpec, source: AwsError) -> Self {
        Self::Service {
            kind: spec.kind(),
            name: spec.name().to_string(),
            source,
        }
    }

    /// Underlying AWS error, if this error came from a remote call
    pub fn aws_error(&self) -> Option<&AwsError> {
        match self {
            Self::Service { source, .. } | Self::Start { source, .. } | Self::Status { source, .. } => {
                Some(source)
            }
            Self::CreateRace { .. } | Self::ZeroInterval { .. } | Self::Cancelled { .. } => None,
        }
    }
}

/// Render an error and its causes on one line, outermost first
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_chain() {
        let spec = ResourceSpec::database("datalake_db", "");
        let err = ProvisionError::service(
            &spec,
            AwsError::Sdk {
                code: Some("AccessDeniedException".to_string()),
                message: "not allowed".to_string(),
            },
        );
        assert_eq!(
            error_chain(&err),
            "database 'datalake_db' could not be provisioned: AWS error: not allowed"
        );
        assert!(err.aws_error().is_some());
    }

    #[test]
    fn test_cancelled_mentions_remote_job() {
        let err = ProvisionError::Cancelled {
            job: "datalake_crawler".to_string(),
        };
        assert!(err.to_string().contains("keeps running remotely"));
        assert!(err.aws_error().is_none());
    }
}
