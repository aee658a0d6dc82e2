//! Lake bucket operations
//!
//! Bucket setup with its folder markers, uploads of local partition files,
//! per-zone statistics and lifecycle rules. Local discovery is separate from
//! the uploads so it can be checked without touching S3.

use crate::aws::{AwsResources, S3Client};
use crate::config::LakeConfig;
use crate::ensure::ensure;
use crate::lifecycle::{self, LifecycleRule};
use crate::resource::{ResourceHandle, ResourceSpec};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use datalake_common::defaults::{ANALYTICS_REPORTS, ATHENA_RESULTS_PREFIX};
use datalake_common::layout::{count_by_entity, folder_markers, is_folder_marker};
use datalake_common::{PartitionPath, Stage};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extension of files uploaded to the processed zone
const PROCESSED_EXTENSION: &str = "parquet";

/// Extension of raw exports
const RAW_EXTENSION: &str = "csv";

#[derive(Debug, Clone, Serialize)]
pub struct BucketSetup {
    pub bucket: ResourceHandle,
    pub folders: usize,
}

/// Ensure the bucket exists and create its folder markers.
///
/// Markers are plain empty objects, so writing them again is harmless.
pub async fn setup_bucket(resources: &AwsResources, lake: &LakeConfig) -> Result<BucketSetup> {
    let bucket_name = lake.bucket()?;
    let spec = ResourceSpec::bucket(bucket_name, resources.s3().region());
    let bucket = ensure(resources, spec).await?;

    let markers = folder_markers(
        &lake.domain,
        &lake.entity_names(),
        ANALYTICS_REPORTS,
        ATHENA_RESULTS_PREFIX,
    );
    for key in &markers {
        resources
            .s3()
            .put_empty_object(bucket_name, key)
            .await
            .with_context(|| format!("Failed to create folder marker '{key}'"))?;
    }

    info!(bucket = %bucket_name, folders = markers.len(), "Lake bucket ready");
    Ok(BucketSetup {
        bucket,
        folders: markers.len(),
    })
}

/// A local file and the key it is uploaded to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub path: PathBuf,
    pub partition: PartitionPath,
}

/// Raw exports named `<domain>_<entity>.csv` directly in `dir`, partitioned by `date`
pub fn collect_raw_uploads(dir: &Path, domain: &str, date: NaiveDate) -> Result<Vec<Upload>> {
    let prefix = format!("{domain}_");
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;

    let mut uploads = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to read {}", dir.display()))?
            .path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !path.is_file()
            || !file_name.starts_with(&prefix)
            || path.extension().and_then(|e| e.to_str()) != Some(RAW_EXTENSION)
        {
            continue;
        }

        match PartitionPath::for_raw_file(domain, file_name, date) {
            Ok(partition) => uploads.push(Upload {
                path: path.clone(),
                partition,
            }),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping file"),
        }
    }

    uploads.sort_by_key(|u| u.partition.key());
    Ok(uploads)
}

/// Columnar files already laid out as `<domain>/<entity>/date=<d>/<file>.parquet`
/// below `dir`. The partition date comes from the directory, not from today.
pub fn collect_processed_uploads(dir: &Path, domain: &str) -> Result<Vec<Upload>> {
    let domain_dir = dir.join(domain);
    let mut files = Vec::new();
    walk_files(&domain_dir, &mut files)?;

    let mut uploads = Vec::new();
    for path in files {
        if path.extension().and_then(|e| e.to_str()) != Some(PROCESSED_EXTENSION) {
            continue;
        }
        let relative = path.strip_prefix(dir).with_context(|| {
            format!("{} is not below {}", path.display(), dir.display())
        })?;
        match PartitionPath::from_relative(Stage::Processed, relative) {
            Ok(partition) => uploads.push(Upload { path, partition }),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping file outside the partition layout"),
        }
    }

    uploads.sort_by_key(|u| u.partition.key());
    Ok(uploads)
}

fn walk_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("Failed to read {}", dir.display()))?
            .path();
        if path.is_dir() {
            walk_files(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

/// Result of an upload batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadSummary {
    pub uploaded: Vec<String>,
    /// Key and rendered error of every failed upload
    pub failed: Vec<(String, String)>,
}

impl UploadSummary {
    pub fn total(&self) -> usize {
        self.uploaded.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Distinct entities that received at least one file
    pub fn entities(&self) -> Vec<String> {
        let mut entities: Vec<String> = self
            .uploaded
            .iter()
            .filter_map(|key| PartitionPath::parse(key).ok())
            .map(|p| p.entity)
            .collect();
        entities.sort();
        entities.dedup();
        entities
    }
}

/// Upload every file, continuing past individual failures
pub async fn upload_all(s3: &S3Client, bucket: &str, uploads: &[Upload]) -> UploadSummary {
    let mut summary = UploadSummary::default();
    for upload in uploads {
        let key = upload.partition.key();
        match s3.upload_file(bucket, &key, &upload.path).await {
            Ok(()) => {
                info!(file = %upload.path.display(), key = %key, "Uploaded");
                summary.uploaded.push(key);
            }
            Err(e) => {
                warn!(file = %upload.path.display(), key = %key, error = %format!("{e:#}"), "Upload failed");
                summary.failed.push((key, format!("{e:#}")));
            }
        }
    }
    summary
}

/// File counts of one zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneSummary {
    pub prefix: String,
    pub files: usize,
    pub by_entity: BTreeMap<String, usize>,
}

impl ZoneSummary {
    pub fn from_keys(prefix: &str, keys: &[String]) -> Self {
        let by_entity = count_by_entity(keys.iter().map(String::as_str));
        Self {
            prefix: prefix.to_string(),
            files: keys.iter().filter(|k| !is_folder_marker(k)).count(),
            by_entity,
        }
    }
}

/// Prefixes reported by [`verify`]
pub fn verify_prefixes(lake: &LakeConfig) -> Vec<String> {
    vec![
        lake.stage_prefix(Stage::Raw),
        lake.stage_prefix(Stage::Processed),
        format!("{}reports/", Stage::Analytics.prefix()),
    ]
}

/// Count data files per zone and entity, ignoring folder markers
pub async fn verify(s3: &S3Client, lake: &LakeConfig) -> Result<Vec<ZoneSummary>> {
    let bucket = lake.bucket()?;
    let mut zones = Vec::new();
    for prefix in verify_prefixes(lake) {
        let keys = s3
            .list_keys(bucket, &prefix)
            .await
            .with_context(|| format!("Failed to list s3://{bucket}/{prefix}"))?;
        debug!(prefix = %prefix, keys = keys.len(), "Listed zone");
        zones.push(ZoneSummary::from_keys(&prefix, &keys));
    }
    Ok(zones)
}

/// Validate `rules` and install them on the bucket
pub async fn apply_lifecycle(s3: &S3Client, bucket: &str, rules: &[LifecycleRule]) -> Result<()> {
    lifecycle::validate(rules).context("Invalid lifecycle rules")?;
    s3.put_lifecycle(bucket, rules)
        .await
        .with_context(|| format!("Failed to apply lifecycle rules to '{bucket}'"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn may_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_collect_raw_uploads() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("finanzas_customers.csv"));
        touch(&dir.path().join("finanzas_loan_payments.csv"));
        touch(&dir.path().join("ecommerce_orders.csv"));
        touch(&dir.path().join("finanzas_notes.txt"));
        touch(&dir.path().join("nested/finanzas_accounts.csv"));

        let uploads = collect_raw_uploads(dir.path(), "finanzas", may_first()).unwrap();
        let keys: Vec<_> = uploads.iter().map(|u| u.partition.key()).collect();
        assert_eq!(
            keys,
            vec![
                "raw/finanzas/customers/date=2024-05-01/finanzas_customers.csv",
                "raw/finanzas/loan_payments/date=2024-05-01/finanzas_loan_payments.csv",
            ]
        );
        assert!(uploads[0].path.ends_with("finanzas_customers.csv"));
    }

    #[test]
    fn test_collect_raw_uploads_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(collect_raw_uploads(&dir.path().join("nope"), "finanzas", may_first()).is_err());
    }

    #[test]
    fn test_collect_processed_uploads_keeps_partition_date() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("finanzas/customers/date=2024-04-30/part-0.parquet"));
        touch(&root.join("finanzas/accounts/date=2024-05-01/part-0.parquet"));
        touch(&root.join("finanzas/accounts/date=2024-05-01/_SUCCESS"));
        touch(&root.join("finanzas/accounts/part-1.parquet"));
        touch(&root.join("other/accounts/date=2024-05-01/part-0.parquet"));

        let uploads = collect_processed_uploads(root, "finanzas").unwrap();
        let keys: Vec<_> = uploads.iter().map(|u| u.partition.key()).collect();
        assert_eq!(
            keys,
            vec![
                "processed/finanzas/accounts/date=2024-05-01/part-0.parquet",
                "processed/finanzas/customers/date=2024-04-30/part-0.parquet",
            ]
        );
    }

    #[test]
    fn test_collect_processed_uploads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(collect_processed_uploads(dir.path(), "finanzas").unwrap().is_empty());
    }

    #[test]
    fn test_zone_summary_ignores_markers() {
        let keys = vec![
            "raw/finanzas/".to_string(),
            "raw/finanzas/customers/".to_string(),
            "raw/finanzas/customers/date=2024-05-01/finanzas_customers.csv".to_string(),
            "raw/finanzas/customers/date=2024-05-02/finanzas_customers.csv".to_string(),
            "raw/finanzas/loans/date=2024-05-01/finanzas_loans.csv".to_string(),
        ];
        let summary = ZoneSummary::from_keys("raw/finanzas/", &keys);
        assert_eq!(summary.files, 3);
        assert_eq!(summary.by_entity.get("customers"), Some(&2));
        assert_eq!(summary.by_entity.get("loans"), Some(&1));
        assert_eq!(summary.by_entity.len(), 2);
    }

    #[test]
    fn test_upload_summary() {
        let summary = UploadSummary {
            uploaded: vec![
                "raw/finanzas/loans/date=2024-05-01/finanzas_loans.csv".to_string(),
                "raw/finanzas/cards/date=2024-05-01/finanzas_cards.csv".to_string(),
                "raw/finanzas/loans/date=2024-05-02/finanzas_loans.csv".to_string(),
            ],
            failed: vec![("raw/finanzas/x/date=2024-05-01/x.csv".to_string(), "denied".to_string())],
        };
        assert_eq!(summary.total(), 4);
        assert!(!summary.is_complete());
        assert_eq!(summary.entities(), vec!["cards", "loans"]);
    }

    #[test]
    fn test_verify_prefixes() {
        let lake = LakeConfig {
            bucket: Some("lake".to_string()),
            domain: "finanzas".to_string(),
            entities: Vec::new(),
            data_dir: PathBuf::from("data"),
        };
        assert_eq!(
            verify_prefixes(&lake),
            vec!["raw/finanzas/", "processed/finanzas/", "analytics/reports/"]
        );
    }
}
