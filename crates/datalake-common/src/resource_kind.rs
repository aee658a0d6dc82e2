//! Kinds of provisioned resources

use serde::Serialize;

/// Types of AWS resources managed by the provisioner
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// S3 bucket holding the lake
    Bucket,
    /// Glue Data Catalog database
    Database,
    /// IAM role assumed by the crawler
    Role,
    /// Glue crawler (depends on a database and a role)
    Crawler,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ResourceKind::Bucket.to_string(), "bucket");
        assert_eq!(ResourceKind::Crawler.as_ref(), "crawler");
    }
}
