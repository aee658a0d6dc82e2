//! Default configuration values
//!
//! These constants keep the CLI defaults and the library defaults in one place.

/// Default AWS region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default business domain, used as the second segment of every partition key
pub const DEFAULT_DOMAIN: &str = "finanzas";

/// Entities of the default domain
pub const DEFAULT_ENTITIES: &[&str] = &[
    "customers",
    "accounts",
    "transactions",
    "cards",
    "loans",
    "loan_payments",
    "transfers",
    "investments",
    "exchange_rates",
    "branches",
    "bank_employees",
    "account_types",
];

/// Report folders created under `analytics/reports/`
pub const ANALYTICS_REPORTS: &[&str] = &["daily_transactions", "customer_metrics", "loan_analysis"];

/// Prefix holding Athena query results
pub const ATHENA_RESULTS_PREFIX: &str = "athena-results/";

/// Default Glue database name
pub const DEFAULT_DATABASE: &str = "datalake_db";

/// Default Glue database description
pub const DEFAULT_DATABASE_DESCRIPTION: &str = "Finance Data Lake database";

/// Default Glue crawler name (raw zone)
pub const DEFAULT_CRAWLER: &str = "datalake_crawler";

/// Suffix appended to the crawler name for the processed zone
pub const PROCESSED_CRAWLER_SUFFIX: &str = "_processed";

/// Table prefix for tables crawled from the processed zone
pub const PROCESSED_TABLE_PREFIX: &str = "parquet_";

/// Default IAM role assumed by the crawler
pub const DEFAULT_ROLE_NAME: &str = "AWSGlueServiceRole-DataLake";

/// Service principal allowed to assume the crawler role
pub const GLUE_SERVICE_PRINCIPAL: &str = "glue.amazonaws.com";

/// Managed policies attached to a newly created crawler role
pub const DEFAULT_MANAGED_POLICIES: &[&str] = &[
    "arn:aws:iam::aws:policy/service-role/AWSGlueServiceRole",
    "arn:aws:iam::aws:policy/AmazonS3ReadOnlyAccess",
];

/// Default interval between crawler status checks, in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Default crawler polling budget, in seconds (3 minutes)
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 180;

/// Default budget for watching a crawl that is already running, in seconds (5 minutes)
pub const DEFAULT_WATCH_TIMEOUT_SECS: u64 = 300;

/// Default delay after creating a role before it is used, in seconds
pub const DEFAULT_ROLE_PROPAGATION_SECS: u64 = 10;

/// Table prefix for tables crawled from the raw zone of `domain`
pub fn raw_table_prefix(domain: &str) -> String {
    format!("{domain}_")
}
