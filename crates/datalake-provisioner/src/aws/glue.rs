//! Glue catalog database and crawler management

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::error::{AwsError, classify_sdk_error};
use crate::resource::StartOutcome;
use aws_sdk_glue::Client;
use aws_sdk_glue::types::{
    CrawlerState, CrawlerTargets, DatabaseInput, DeleteBehavior, LastCrawlStatus, S3Target,
    SchemaChangePolicy, UpdateBehavior,
};
use chrono::Utc;
use datalake_common::JobState;
use datalake_common::tags;
use tracing::{debug, info};

/// Parameters of a new crawler
#[derive(Debug, Clone, Copy)]
pub struct CrawlerDefinition<'a> {
    pub name: &'a str,
    pub database: &'a str,
    pub role_arn: &'a str,
    pub source_path: &'a str,
    pub table_prefix: Option<&'a str>,
}

/// Glue client for the lake catalog
#[derive(Clone)]
pub struct GlueClient {
    client: Client,
}

impl FromAwsContext for GlueClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.glue_client(),
        }
    }
}

impl GlueClient {
    pub async fn database_exists(&self, name: &str) -> Result<bool, AwsError> {
        match self.client.get_database().name(name).send().await {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_entity_not_found_exception()) =>
            {
                Ok(false)
            }
            Err(err) => Err(classify_sdk_error(&err)),
        }
    }

    pub async fn create_database(&self, name: &str, description: &str) -> Result<(), AwsError> {
        info!(database = %name, "Creating Glue database");

        let input = DatabaseInput::builder()
            .name(name)
            .description(description)
            .build()
            .map_err(|e| AwsError::Validation(format!("Failed to build database input: {e}")))?;

        let mut request = self.client.create_database().database_input(input);
        for (key, value) in tags::standard_tags(Utc::now()) {
            request = request.tags(key, value);
        }
        request.send().await.map_err(|e| classify_sdk_error(&e))?;

        Ok(())
    }

    pub async fn crawler_exists(&self, name: &str) -> Result<bool, AwsError> {
        match self.client.get_crawler().name(name).send().await {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_entity_not_found_exception()) =>
            {
                Ok(false)
            }
            Err(err) => Err(classify_sdk_error(&err)),
        }
    }

    /// Create a crawler over an S3 path.
    ///
    /// Schema changes update the catalog in place and deleted objects are only
    /// logged, so tables are never dropped by a crawl.
    pub async fn create_crawler(&self, crawler: CrawlerDefinition<'_>) -> Result<(), AwsError> {
        info!(
            crawler = %crawler.name,
            database = %crawler.database,
            source = %crawler.source_path,
            "Creating Glue crawler"
        );

        let targets = CrawlerTargets::builder()
            .s3_targets(S3Target::builder().path(crawler.source_path).build())
            .build();
        let schema_change_policy = SchemaChangePolicy::builder()
            .update_behavior(UpdateBehavior::UpdateInDatabase)
            .delete_behavior(DeleteBehavior::Log)
            .build();

        let mut request = self
            .client
            .create_crawler()
            .name(crawler.name)
            .role(crawler.role_arn)
            .database_name(crawler.database)
            .targets(targets)
            .schema_change_policy(schema_change_policy)
            .set_table_prefix(crawler.table_prefix.map(str::to_string));
        for (key, value) in tags::standard_tags(Utc::now()) {
            request = request.tags(key, value);
        }
        request.send().await.map_err(|e| classify_sdk_error(&e))?;

        Ok(())
    }

    /// Start a crawl; a crawl already in progress is reported, not an error
    pub async fn start_crawler(&self, name: &str) -> Result<StartOutcome, AwsError> {
        match self.client.start_crawler().name(name).send().await {
            Ok(_) => {
                info!(crawler = %name, "Crawler started");
                Ok(StartOutcome::Started)
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_crawler_running_exception()) =>
            {
                info!(crawler = %name, "Crawler already running");
                Ok(StartOutcome::AlreadyRunning)
            }
            Err(err) => match classify_sdk_error(&err) {
                e if e.is_already_running() => Ok(StartOutcome::AlreadyRunning),
                e => Err(e),
            },
        }
    }

    /// Current state of a crawler, folded with the result of its last crawl
    pub async fn crawler_state(&self, name: &str) -> Result<JobState, AwsError> {
        let response = self
            .client
            .get_crawler()
            .name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let crawler = response
            .crawler()
            .ok_or_else(|| AwsError::Unexpected(format!("GetCrawler returned no crawler for '{name}'")))?;
        let state = crawler
            .state()
            .ok_or_else(|| AwsError::Unexpected(format!("crawler '{name}' reported no state")))?;
        let last_crawl = crawler.last_crawl().and_then(|l| l.status());

        let label = crawler_status_label(state, last_crawl);
        debug!(crawler = %name, state = %state.as_str(), status = %label, "Crawler state");
        Ok(JobState::normalize(label)?)
    }
}

/// Status string of a crawler as understood by [`JobState::normalize`].
///
/// An idle crawler reports `READY` whatever its last crawl did, so a failed
/// or cancelled last crawl overrides the idle state.
pub fn crawler_status_label<'a>(
    state: &'a CrawlerState,
    last_crawl: Option<&LastCrawlStatus>,
) -> &'a str {
    match (state, last_crawl) {
        (CrawlerState::Ready, Some(LastCrawlStatus::Failed)) => "FAILED",
        (CrawlerState::Ready, Some(LastCrawlStatus::Cancelled)) => "UNKNOWN",
        (state, _) => state.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized(state: &CrawlerState, last: Option<&LastCrawlStatus>) -> JobState {
        JobState::normalize(crawler_status_label(state, last)).unwrap()
    }

    #[test]
    fn test_running_states_pass_through() {
        assert_eq!(normalized(&CrawlerState::Running, None), JobState::Running);
        assert_eq!(
            normalized(&CrawlerState::Stopping, Some(&LastCrawlStatus::Succeeded)),
            JobState::Stopping
        );
    }

    #[test]
    fn test_ready_folds_last_crawl() {
        assert_eq!(normalized(&CrawlerState::Ready, None), JobState::Ready);
        assert_eq!(
            normalized(&CrawlerState::Ready, Some(&LastCrawlStatus::Succeeded)),
            JobState::Ready
        );
        assert_eq!(
            normalized(&CrawlerState::Ready, Some(&LastCrawlStatus::Failed)),
            JobState::Failed
        );
        assert_eq!(
            normalized(&CrawlerState::Ready, Some(&LastCrawlStatus::Cancelled)),
            JobState::Unknown
        );
    }

    #[test]
    fn test_unknown_state_fails_normalization() {
        let state = CrawlerState::from("PAUSED");
        let label = crawler_status_label(&state, None);
        assert_eq!(label, "PAUSED");
        assert!(JobState::normalize(label).is_err());
    }
}
