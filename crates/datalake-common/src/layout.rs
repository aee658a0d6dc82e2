//! Storage layout of the lake
//!
//! Every data file lives under a partition key of the form
//!
//! ```text
//! <stage>/<domain>/<entity>/date=<YYYY-MM-DD>/<file>
//! ```
//!
//! The same layout is used for S3 keys and for local intermediate
//! directories, so the catalog crawler can discover one partition per
//! entity and date.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path};
use thiserror::Error;

/// Name of the partition column encoded in the key
pub const PARTITION_COLUMN: &str = "date";

/// Format of the partition date
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Zone of the lake a key belongs to
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Source CSV files as uploaded
    Raw,
    /// Columnar files derived from the raw zone
    Processed,
    /// Reports built on top of processed data
    Analytics,
}

impl Stage {
    /// Key prefix of this stage, with trailing slash
    pub fn prefix(self) -> String {
        format!("{self}/")
    }
}

/// Errors produced while building or parsing partition keys
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("expected <stage>/<domain>/<entity>/date=<YYYY-MM-DD>/<file>, got '{0}'")]
    Shape(String),

    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    #[error("invalid partition segment '{0}'")]
    InvalidDate(String),

    #[error("file name '{file}' does not match '{domain}_<entity>.<ext>'")]
    ForeignFile { file: String, domain: String },
}

/// A fully qualified partition key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PartitionPath {
    pub stage: Stage,
    pub domain: String,
    pub entity: String,
    pub date: NaiveDate,
    pub file: String,
}

impl PartitionPath {
    pub fn new(
        stage: Stage,
        domain: impl Into<String>,
        entity: impl Into<String>,
        date: NaiveDate,
        file: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            domain: domain.into(),
            entity: entity.into(),
            date,
            file: file.into(),
        }
    }

    /// Partition for a raw export named `<domain>_<entity>.<ext>`.
    pub fn for_raw_file(domain: &str, file_name: &str, date: NaiveDate) -> Result<Self, LayoutError> {
        let foreign = || LayoutError::ForeignFile {
            file: file_name.to_string(),
            domain: domain.to_string(),
        };
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(foreign)?;
        let entity = stem
            .strip_prefix(domain)
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|entity| !entity.is_empty())
            .ok_or_else(foreign)?;

        Ok(Self::new(Stage::Raw, domain, entity, date, file_name))
    }

    /// Partition for a file already laid out as `<domain>/<entity>/date=<d>/<file>`
    /// relative to the local directory of `stage`.
    pub fn from_relative(stage: Stage, relative: &Path) -> Result<Self, LayoutError> {
        let mut segments = vec![stage.to_string()];
        for component in relative.components() {
            match component {
                Component::Normal(part) => match part.to_str() {
                    Some(part) => segments.push(part.to_string()),
                    None => return Err(LayoutError::Shape(relative.display().to_string())),
                },
                _ => return Err(LayoutError::Shape(relative.display().to_string())),
            }
        }
        Self::parse(&segments.join("/"))
    }

    /// Parse an object key
    pub fn parse(key: &str) -> Result<Self, LayoutError> {
        let parts: Vec<&str> = key.split('/').collect();
        let [stage, domain, entity, partition, file] = parts.as_slice() else {
            return Err(LayoutError::Shape(key.to_string()));
        };
        if [domain, entity, file].iter().any(|s| s.is_empty()) {
            return Err(LayoutError::Shape(key.to_string()));
        }

        let stage: Stage = stage
            .parse()
            .map_err(|_| LayoutError::UnknownStage((*stage).to_string()))?;
        let date = parse_partition_segment(partition)?;

        Ok(Self::new(stage, *domain, *entity, date, *file))
    }

    /// Object key, e.g. `raw/finanzas/customers/date=2024-05-01/finanzas_customers.csv`
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.stage,
            self.domain,
            self.entity,
            partition_segment(self.date),
            self.file
        )
    }
}

impl fmt::Display for PartitionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// `date=<YYYY-MM-DD>`
pub fn partition_segment(date: NaiveDate) -> String {
    format!("{PARTITION_COLUMN}={}", date.format(DATE_FORMAT))
}

fn parse_partition_segment(segment: &str) -> Result<NaiveDate, LayoutError> {
    segment
        .strip_prefix(PARTITION_COLUMN)
        .and_then(|rest| rest.strip_prefix('='))
        .and_then(|date| NaiveDate::parse_from_str(date, DATE_FORMAT).ok())
        .ok_or_else(|| LayoutError::InvalidDate(segment.to_string()))
}

/// Folder marker keys making up an empty lake.
///
/// One marker per entity in the raw and processed zones, one per report in
/// the analytics zone, plus the query results prefix.
pub fn folder_markers(
    domain: &str,
    entities: &[&str],
    reports: &[&str],
    athena_results_prefix: &str,
) -> Vec<String> {
    let mut markers = Vec::with_capacity(entities.len() * 2 + reports.len() + 1);
    for stage in [Stage::Raw, Stage::Processed] {
        markers.extend(
            entities
                .iter()
                .map(|entity| format!("{stage}/{domain}/{entity}/")),
        );
    }
    markers.extend(
        reports
            .iter()
            .map(|report| format!("{}/reports/{report}/", Stage::Analytics)),
    );
    markers.push(athena_results_prefix.to_string());
    markers
}

/// Folder markers are empty objects whose key ends with `/`
pub fn is_folder_marker(key: &str) -> bool {
    key.ends_with('/')
}

/// Count data files per entity (third key segment), ignoring folder markers.
pub fn count_by_entity<'a>(keys: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for key in keys.into_iter().filter(|k| !is_folder_marker(k)) {
        if let Some(entity) = key.split('/').nth(2) {
            *counts.entry(entity.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn may_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_raw_file_key() {
        let path = PartitionPath::for_raw_file("finanzas", "finanzas_loan_payments.csv", may_first())
            .unwrap();
        assert_eq!(path.entity, "loan_payments");
        assert_eq!(
            path.key(),
            "raw/finanzas/loan_payments/date=2024-05-01/finanzas_loan_payments.csv"
        );
    }

    #[test]
    fn test_raw_file_from_other_domain_rejected() {
        let err = PartitionPath::for_raw_file("finanzas", "ecommerce_orders.csv", may_first())
            .unwrap_err();
        assert!(matches!(err, LayoutError::ForeignFile { .. }));

        let err = PartitionPath::for_raw_file("finanzas", "finanzas_.csv", may_first()).unwrap_err();
        assert!(matches!(err, LayoutError::ForeignFile { .. }));
    }

    #[test]
    fn test_parse_key() {
        let path =
            PartitionPath::parse("processed/finanzas/cards/date=2024-05-01/cards.parquet").unwrap();
        assert_eq!(path.stage, Stage::Processed);
        assert_eq!(path.domain, "finanzas");
        assert_eq!(path.entity, "cards");
        assert_eq!(path.date, may_first());
        assert_eq!(path.file, "cards.parquet");
    }

    #[test]
    fn test_parse_rejects_bad_keys() {
        assert!(matches!(
            PartitionPath::parse("raw/finanzas/cards/"),
            Err(LayoutError::Shape(_))
        ));
        assert!(matches!(
            PartitionPath::parse("bronze/finanzas/cards/date=2024-05-01/x.csv"),
            Err(LayoutError::UnknownStage(_))
        ));
        assert!(matches!(
            PartitionPath::parse("raw/finanzas/cards/day=2024-05-01/x.csv"),
            Err(LayoutError::InvalidDate(_))
        ));
        assert!(matches!(
            PartitionPath::parse("raw/finanzas/cards/date=2024-13-01/x.csv"),
            Err(LayoutError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_from_relative_path() {
        let rel = Path::new("finanzas/cards/date=2024-05-01/cards.parquet");
        let path = PartitionPath::from_relative(Stage::Processed, rel).unwrap();
        assert_eq!(
            path.key(),
            "processed/finanzas/cards/date=2024-05-01/cards.parquet"
        );

        let too_short = Path::new("finanzas/cards.parquet");
        assert!(PartitionPath::from_relative(Stage::Processed, too_short).is_err());
    }

    #[test]
    fn test_folder_markers() {
        let markers = folder_markers(
            "finanzas",
            &["customers", "cards"],
            &["daily_transactions"],
            "athena-results/",
        );
        assert_eq!(
            markers,
            vec![
                "raw/finanzas/customers/",
                "raw/finanzas/cards/",
                "processed/finanzas/customers/",
                "processed/finanzas/cards/",
                "analytics/reports/daily_transactions/",
                "athena-results/",
            ]
        );
        assert!(markers.iter().all(|m| is_folder_marker(m)));
    }

    #[test]
    fn test_count_by_entity_skips_markers() {
        let keys = [
            "raw/finanzas/cards/",
            "raw/finanzas/cards/date=2024-05-01/finanzas_cards.csv",
            "raw/finanzas/cards/date=2024-05-02/finanzas_cards.csv",
            "raw/finanzas/loans/date=2024-05-01/finanzas_loans.csv",
            "raw/",
        ];
        let counts = count_by_entity(keys);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["cards"], 2);
        assert_eq!(counts["loans"], 1);
    }
}
