//! AWS resource tag constants
//!
//! Resources created by the provisioner are tagged so they can be found
//! later in the console or with the tagging API.
//!
//! | Tag Key | Description |
//! |---------|-------------|
//! | `datalake:tool` | Static identifier ("datalake") |
//! | `datalake:created-at` | RFC 3339 creation timestamp |

use chrono::{DateTime, Utc};

/// Tag key for tool identification
pub const TAG_TOOL: &str = "datalake:tool";

/// Tag value for tool identification
pub const TAG_TOOL_VALUE: &str = "datalake";

/// Tag key for creation timestamp (RFC 3339 format)
pub const TAG_CREATED_AT: &str = "datalake:created-at";

/// Helper to format creation timestamp for tags
pub fn format_created_at(time: DateTime<Utc>) -> String {
    time.to_rfc3339()
}

/// Standard tags for a resource created at `now`
pub fn standard_tags(now: DateTime<Utc>) -> Vec<(&'static str, String)> {
    vec![
        (TAG_TOOL, TAG_TOOL_VALUE.to_string()),
        (TAG_CREATED_AT, format_created_at(now)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_at_is_rfc3339() {
        let time = DateTime::parse_from_rfc3339("2024-05-01T12:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_created_at(time), "2024-05-01T12:30:00+00:00");
    }

    #[test]
    fn test_standard_tags_include_tool() {
        let tags = standard_tags(Utc::now());
        assert!(tags.contains(&(TAG_TOOL, TAG_TOOL_VALUE.to_string())));
        assert!(tags.iter().any(|(k, _)| *k == TAG_CREATED_AT));
    }
}
