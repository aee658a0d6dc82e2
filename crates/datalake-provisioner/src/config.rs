//! Configuration types for the provisioner
//!
//! Built once from the command line (and `.env`) in `main`, then passed by
//! reference. Nothing reads the environment after startup.

use crate::pipeline::{CrawlerPlan, PipelineSpec};
use crate::poller::PollConfig;
use crate::resource::ResourceSpec;
use datalake_common::Stage;
use datalake_common::defaults::{
    GLUE_SERVICE_PRINCIPAL, PROCESSED_CRAWLER_SUFFIX, PROCESSED_TABLE_PREFIX, raw_table_prefix,
};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("No bucket configured, pass --bucket or set S3_BUCKET_NAME")]
    MissingBucket,
}

/// AWS connection settings
#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    /// AWS profile name (overrides default credential resolution)
    pub profile: Option<String>,
}

/// Bucket and local data layout
#[derive(Debug, Clone)]
pub struct LakeConfig {
    /// Only commands that touch the bucket need it
    pub bucket: Option<String>,
    /// Data domain, the second key segment (e.g. `finanzas`)
    pub domain: String,
    pub entities: Vec<String>,
    /// Local root holding `raw/` and `processed/`
    pub data_dir: PathBuf,
}

impl LakeConfig {
    pub fn bucket(&self) -> Result<&str, ConfigError> {
        self.bucket
            .as_deref()
            .filter(|b| !b.is_empty())
            .ok_or(ConfigError::MissingBucket)
    }

    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(String::as_str).collect()
    }

    /// `s3://<bucket>/<stage>/<domain>/`
    pub fn stage_uri(&self, stage: Stage) -> Result<String, ConfigError> {
        Ok(format!("s3://{}/{}", self.bucket()?, self.stage_prefix(stage)))
    }

    /// `<stage>/<domain>/`
    pub fn stage_prefix(&self, stage: Stage) -> String {
        format!("{stage}/{}/", self.domain)
    }

    /// Local directory of a stage
    pub fn local_dir(&self, stage: Stage) -> PathBuf {
        self.data_dir.join(stage.as_ref())
    }
}

/// Glue catalog and crawler role settings
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub database: String,
    pub database_description: String,
    /// Crawler of the raw zone; the processed crawler derives its name from it
    pub crawler: String,
    pub role_name: String,
    pub managed_policies: Vec<String>,
    /// Wait after creating the role, zero disables it
    pub role_propagation: Duration,
}

/// Lake zone a crawler catalogs
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CatalogZone {
    Raw,
    Processed,
}

impl CatalogZone {
    pub fn stage(self) -> Stage {
        match self {
            Self::Raw => Stage::Raw,
            Self::Processed => Stage::Processed,
        }
    }
}

/// Complete provisioner configuration
///
/// Composed of focused sub-configs, one per concern.
#[derive(Debug, Clone)]
pub struct Config {
    pub aws: AwsConfig,
    pub lake: LakeConfig,
    pub catalog: CatalogConfig,
    /// Budget for a crawl started by `catalog`
    pub poll: PollConfig,
    /// Budget for waiting on a crawl someone else started
    pub watch_poll: PollConfig,
}

impl Config {
    /// Crawler name for a zone
    pub fn crawler_name(&self, zone: CatalogZone) -> String {
        match zone {
            CatalogZone::Raw => self.catalog.crawler.clone(),
            CatalogZone::Processed => format!("{}{PROCESSED_CRAWLER_SUFFIX}", self.catalog.crawler),
        }
    }

    /// Resource graph cataloging `zone`; both zones share database and role
    pub fn pipeline_spec(&self, zone: CatalogZone) -> Result<PipelineSpec, ConfigError> {
        let policies: Vec<&str> = self.catalog.managed_policies.iter().map(String::as_str).collect();
        let table_prefix = match zone {
            CatalogZone::Raw => raw_table_prefix(&self.lake.domain),
            CatalogZone::Processed => PROCESSED_TABLE_PREFIX.to_string(),
        };

        Ok(PipelineSpec {
            database: ResourceSpec::database(&self.catalog.database, &self.catalog.database_description),
            role: ResourceSpec::role(&self.catalog.role_name, GLUE_SERVICE_PRINCIPAL, &policies),
            crawler: CrawlerPlan {
                name: self.crawler_name(zone),
                source_path: self.lake.stage_uri(zone.stage())?,
                table_prefix,
            },
            poll: self.poll,
            role_propagation: self.catalog.role_propagation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::keys;
    use datalake_common::defaults::{
        DEFAULT_CRAWLER, DEFAULT_DATABASE, DEFAULT_DATABASE_DESCRIPTION, DEFAULT_DOMAIN,
        DEFAULT_MANAGED_POLICIES, DEFAULT_ROLE_NAME, DEFAULT_WATCH_TIMEOUT_SECS,
    };

    fn config(bucket: Option<&str>) -> Config {
        Config {
            aws: AwsConfig {
                region: "us-east-1".to_string(),
                profile: None,
            },
            lake: LakeConfig {
                bucket: bucket.map(str::to_string),
                domain: DEFAULT_DOMAIN.to_string(),
                entities: vec!["customers".to_string()],
                data_dir: PathBuf::from("data"),
            },
            catalog: CatalogConfig {
                database: DEFAULT_DATABASE.to_string(),
                database_description: DEFAULT_DATABASE_DESCRIPTION.to_string(),
                crawler: DEFAULT_CRAWLER.to_string(),
                role_name: DEFAULT_ROLE_NAME.to_string(),
                managed_policies: DEFAULT_MANAGED_POLICIES.iter().map(|s| s.to_string()).collect(),
                role_propagation: Duration::from_secs(10),
            },
            poll: PollConfig::default(),
            watch_poll: PollConfig {
                timeout: Duration::from_secs(DEFAULT_WATCH_TIMEOUT_SECS),
                ..PollConfig::default()
            },
        }
    }

    #[test]
    fn test_raw_zone_pipeline() {
        let spec = config(Some("lake")).pipeline_spec(CatalogZone::Raw).unwrap();
        assert_eq!(spec.crawler.name, "datalake_crawler");
        assert_eq!(spec.crawler.source_path, "s3://lake/raw/finanzas/");
        assert_eq!(spec.crawler.table_prefix, "finanzas_");
        assert_eq!(spec.database.name(), "datalake_db");
        assert_eq!(
            spec.role.config_value(keys::TRUST_SERVICE),
            Some("glue.amazonaws.com")
        );
        assert_eq!(spec.role.config_list(keys::MANAGED_POLICY_ARNS).len(), 2);
    }

    #[test]
    fn test_processed_zone_pipeline() {
        let spec = config(Some("lake")).pipeline_spec(CatalogZone::Processed).unwrap();
        assert_eq!(spec.crawler.name, "datalake_crawler_processed");
        assert_eq!(spec.crawler.source_path, "s3://lake/processed/finanzas/");
        assert_eq!(spec.crawler.table_prefix, "parquet_");
        assert_eq!(spec.role.name(), DEFAULT_ROLE_NAME);
    }

    #[test]
    fn test_catalog_needs_a_bucket() {
        let config = config(None);
        assert_eq!(
            config.pipeline_spec(CatalogZone::Raw).unwrap_err(),
            ConfigError::MissingBucket
        );
        assert_eq!(config.lake.bucket(), Err(ConfigError::MissingBucket));

        let empty = self::config(Some(""));
        assert_eq!(empty.lake.bucket(), Err(ConfigError::MissingBucket));
    }

    #[test]
    fn test_watch_needs_only_the_crawler() {
        let config = config(None);
        assert_eq!(config.crawler_name(CatalogZone::Processed), "datalake_crawler_processed");
        assert_eq!(config.watch_poll.timeout, Duration::from_secs(300));
        assert!(config.watch_poll.timeout > config.poll.timeout);
    }

    #[test]
    fn test_local_dirs() {
        let config = config(Some("lake"));
        assert_eq!(config.lake.local_dir(Stage::Raw), PathBuf::from("data/raw"));
        assert_eq!(config.lake.stage_prefix(Stage::Processed), "processed/finanzas/");
    }
}
