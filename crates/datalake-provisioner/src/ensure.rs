//! Create-if-absent provisioning
//!
//! [`ensure`] looks a resource up and creates it only when the lookup says
//! it is absent. The lookup and the create are two separate remote calls, so
//! the sequence is not atomic: another actor can create the same resource in
//! between. Provisioning assumes a single operator, and when the race does
//! happen the service's "already exists" answer is reported as
//! [`ProvisionError::CreateRace`] instead of being treated as success.

use crate::error::ProvisionError;
use crate::resource::{ResourceClient, ResourceHandle, ResourceSpec};
use tracing::{debug, info};

/// Make sure the resource described by `spec` exists.
///
/// Returns a handle with `existed_before = true` when nothing had to be
/// created. `create` is called at most once, and only after `find` reported
/// the resource as absent.
pub async fn ensure<C>(client: &C, spec: ResourceSpec) -> Result<ResourceHandle, ProvisionError>
where
    C: ResourceClient,
{
    debug!(kind = %spec.kind(), name = %spec.name(), "Checking resource");

    let existing = client
        .find(&spec)
        .await
        .map_err(|e| ProvisionError::service(&spec, e))?;

    if let Some(remote_id) = existing {
        info!(kind = %spec.kind(), name = %spec.name(), "Resource already exists, nothing to do");
        return Ok(ResourceHandle::new(spec, remote_id, true));
    }

    let remote_id = match client.create(&spec).await {
        Ok(remote_id) => remote_id,
        Err(e) if e.is_already_exists() => {
            return Err(ProvisionError::CreateRace {
                kind: spec.kind(),
                name: spec.name().to_string(),
            });
        }
        Err(e) => return Err(ProvisionError::service(&spec, e)),
    };

    info!(kind = %spec.kind(), name = %spec.name(), remote_id = %remote_id, "Resource created");
    Ok(ResourceHandle::new(spec, remote_id, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::AwsError;
    use crate::resource::{MockResourceClient, RemoteId};
    use datalake_common::ResourceKind;
    use mockall::Sequence;

    fn database() -> ResourceSpec {
        ResourceSpec::database("datalake_db", "Finance Data Lake database")
    }

    #[tokio::test]
    async fn creates_missing_resource() {
        let mut client = MockResourceClient::new();
        let mut seq = Sequence::new();
        client
            .expect_find()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        client
            .expect_create()
            .withf(|spec| spec.name() == "datalake_db")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|spec| Ok(RemoteId::new(spec.name())));

        let handle = ensure(&client, database()).await.unwrap();
        assert!(!handle.existed_before());
        assert_eq!(handle.remote_id().as_str(), "datalake_db");
        assert_eq!(handle.spec(), &database());
    }

    #[tokio::test]
    async fn existing_resource_is_not_created() {
        let mut client = MockResourceClient::new();
        client
            .expect_find()
            .times(1)
            .returning(|_| Ok(Some(RemoteId::new("arn:aws:iam::123456789012:role/glue"))));
        client.expect_create().never();

        let spec = ResourceSpec::role("glue", "glue.amazonaws.com", &[]);
        let handle = ensure(&client, spec).await.unwrap();
        assert!(handle.existed_before());
        assert_eq!(handle.remote_id().as_str(), "arn:aws:iam::123456789012:role/glue");
    }

    #[tokio::test]
    async fn lookup_failure_is_fatal_and_skips_create() {
        let mut client = MockResourceClient::new();
        client.expect_find().returning(|_| {
            Err(AwsError::Sdk {
                code: Some("AccessDeniedException".to_string()),
                message: "denied".to_string(),
            })
        });
        client.expect_create().never();

        let err = ensure(&client, database()).await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Service { kind: ResourceKind::Database, ref name, .. } if name == "datalake_db"
        ));
    }

    #[tokio::test]
    async fn create_service_error_is_fatal() {
        let mut client = MockResourceClient::new();
        client.expect_find().returning(|_| Ok(None));
        client
            .expect_create()
            .times(1)
            .returning(|_| Err(AwsError::Validation("bad input".to_string())));

        let err = ensure(&client, database()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Service { .. }));
        assert!(matches!(err.aws_error(), Some(AwsError::Validation(_))));
    }

    #[tokio::test]
    async fn not_found_from_create_is_still_fatal() {
        let mut client = MockResourceClient::new();
        client.expect_find().returning(|_| Ok(None));
        client.expect_create().returning(|_| {
            Err(AwsError::NotFound {
                resource_type: "bucket",
                resource_id: "lake".to_string(),
            })
        });

        let err = ensure(&client, ResourceSpec::bucket("lake", "us-east-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Service { kind: ResourceKind::Bucket, .. }));
    }

    #[tokio::test]
    async fn concurrent_creation_is_reported() {
        let mut client = MockResourceClient::new();
        client.expect_find().returning(|_| Ok(None));
        client
            .expect_create()
            .returning(|_| Err(AwsError::AlreadyExists("datalake_db".to_string())));

        let err = ensure(&client, database()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::CreateRace { kind: ResourceKind::Database, .. }));
        assert!(err.to_string().contains("datalake_db"));
    }
}
