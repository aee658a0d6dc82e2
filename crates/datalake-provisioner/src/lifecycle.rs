//! Bucket lifecycle rules
//!
//! Rules are plain values here and are converted to the S3 model only when
//! they are sent, see [`crate::aws::S3Client::put_lifecycle`].

use datalake_common::Stage;
use datalake_common::defaults::ATHENA_RESULTS_PREFIX;
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

/// Storage class an object transitions to
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(ascii_case_insensitive, serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageClass {
    StandardIa,
    GlacierIr,
    Glacier,
    DeepArchive,
}

/// Move objects to another storage class after `days`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub days: u32,
    pub storage_class: StorageClass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleRule {
    pub id: String,
    pub enabled: bool,
    /// Key prefix the rule applies to
    pub prefix: String,
    pub transition: Option<Transition>,
    pub expiration_days: Option<u32>,
}

impl LifecycleRule {
    /// Enabled rule moving objects under `prefix` to `storage_class` after `days`
    pub fn archive(id: &str, prefix: impl Into<String>, days: u32, storage_class: StorageClass) -> Self {
        Self {
            id: id.to_string(),
            enabled: true,
            prefix: prefix.into(),
            transition: Some(Transition {
                days,
                storage_class,
            }),
            expiration_days: None,
        }
    }

    /// Enabled rule deleting objects under `prefix` after `days`
    pub fn expire(id: &str, prefix: impl Into<String>, days: u32) -> Self {
        Self {
            id: id.to_string(),
            enabled: true,
            prefix: prefix.into(),
            transition: None,
            expiration_days: Some(days),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("lifecycle rule without an id")]
    EmptyId,

    #[error("duplicate lifecycle rule id '{0}'")]
    DuplicateId(String),

    #[error("lifecycle rule '{0}' has neither a transition nor an expiration")]
    NoAction(String),

    #[error("lifecycle rule '{0}' expires objects after zero days")]
    ZeroDays(String),

    #[error("lifecycle rule '{id}' expires objects after {expiration} days, before their transition at {transition} days")]
    ExpiresBeforeTransition {
        id: String,
        transition: u32,
        expiration: u32,
    },
}

/// Rules applied to a fresh lake bucket
pub fn default_rules() -> Vec<LifecycleRule> {
    vec![
        LifecycleRule::archive("Archive-old-raw-data", Stage::Raw.prefix(), 30, StorageClass::Glacier),
        LifecycleRule::expire("Delete-temp-athena-results", ATHENA_RESULTS_PREFIX, 7),
        LifecycleRule::archive(
            "Archive-old-processed-data",
            Stage::Processed.prefix(),
            90,
            StorageClass::Glacier,
        ),
    ]
}

/// Check rules before they are sent; S3 would reject most of these anyway,
/// but only after a round trip and with a less specific message.
pub fn validate(rules: &[LifecycleRule]) -> Result<(), LifecycleError> {
    let mut seen = HashSet::new();
    for rule in rules {
        if rule.id.trim().is_empty() {
            return Err(LifecycleError::EmptyId);
        }
        if !seen.insert(rule.id.as_str()) {
            return Err(LifecycleError::DuplicateId(rule.id.clone()));
        }
        if rule.transition.is_none() && rule.expiration_days.is_none() {
            return Err(LifecycleError::NoAction(rule.id.clone()));
        }
        // A zero-day transition moves objects right away; a zero-day expiration is invalid
        if rule.expiration_days == Some(0) {
            return Err(LifecycleError::ZeroDays(rule.id.clone()));
        }
        let transition_days = rule.transition.map(|t| t.days);
        if let (Some(transition), Some(expiration)) = (transition_days, rule.expiration_days) {
            if expiration <= transition {
                return Err(LifecycleError::ExpiresBeforeTransition {
                    id: rule.id.clone(),
                    transition,
                    expiration,
                });
            }
        }
    }
    Ok(())
}
