//! Pipeline driver
//!
//! Provisions the catalog resources in dependency order and runs the
//! crawler:
//!
//! ```text
//! EnsureDatabase -> EnsureRole -> EnsureCrawler -> StartCrawler -> PollCrawler
//! ```
//!
//! The first failing step stops the pipeline. Nothing is rolled back;
//! resources created by earlier steps stay in place and are found by the
//! next run.

pub mod progress;
pub mod types;

pub use progress::{LogReporter, ProvisionReporter};
pub use types::{CrawlerPlan, PipelineResult, PipelineSpec, Step, StepOutcome, StepReport};

use crate::ensure::ensure;
use crate::error::{ProvisionError, error_chain};
use crate::poller::{JobPoller, JobRun, PollConfig};
use crate::resource::{ResourceClient, ResourceHandle, ResourceSpec, StartOutcome};
use datalake_common::JobOutcome;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

pub struct Pipeline<'a, C, R> {
    client: &'a C,
    reporter: &'a R,
    cancel: Option<CancellationToken>,
}

impl<'a, C, R> Pipeline<'a, C, R>
where
    C: ResourceClient,
    R: ProvisionReporter,
{
    pub fn new(client: &'a C, reporter: &'a R) -> Self {
        Self {
            client,
            reporter,
            cancel: None,
        }
    }

    /// Stop waiting (propagation delay, polling) when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Ensure database, role and crawler, then run the crawler to completion.
    #[instrument(
        skip_all,
        fields(
            database = %spec.database.name(),
            role = %spec.role.name(),
            crawler = %spec.crawler.name
        )
    )]
    pub async fn provision(&self, spec: &PipelineSpec) -> PipelineResult {
        let mut result = PipelineResult::default();
        self.provision_steps(spec, &mut result).await;
        self.reporter.report_finished(&result);
        result
    }

    /// Poll a crawler that is already running, without starting it
    #[instrument(skip_all, fields(crawler = %job_name))]
    pub async fn watch(&self, job_name: &str, config: PollConfig) -> PipelineResult {
        let mut result = PipelineResult::default();
        self.poll_step(JobRun::new(job_name, config), &mut result).await;
        self.reporter.report_finished(&result);
        result
    }

    /// Runs the steps until the first failure. Every executed step is recorded.
    async fn provision_steps(&self, spec: &PipelineSpec, result: &mut PipelineResult) {
        let Some(database) = self
            .ensure_step(Step::EnsureDatabase, spec.database.clone(), result)
            .await
        else {
            return;
        };

        let Some(role) = self.ensure_step(Step::EnsureRole, spec.role.clone(), result).await else {
            return;
        };

        if !role.existed_before() && !spec.role_propagation.is_zero() {
            self.reporter
                .report_propagation_wait(role.spec().name(), spec.role_propagation);
            if !self.wait(spec.role_propagation).await {
                self.fail(
                    Step::EnsureCrawler,
                    &spec.crawler.name,
                    "cancelled while waiting for IAM role propagation".to_string(),
                    None,
                    result,
                );
                return;
            }
        }

        let crawler_spec = ResourceSpec::crawler(
            &spec.crawler.name,
            database.spec().name(),
            role.remote_id().as_str(),
            &spec.crawler.source_path,
            &spec.crawler.table_prefix,
        );
        if self
            .ensure_step(Step::EnsureCrawler, crawler_spec, result)
            .await
            .is_none()
        {
            return;
        }

        let poller = self.poller();
        let run = match poller.start(&spec.crawler.name, spec.poll).await {
            Ok(run) => run,
            Err(e) => {
                self.fail_with(Step::StartCrawler, &spec.crawler.name, &e, result);
                return;
            }
        };
        let started = match run.start_outcome() {
            Some(StartOutcome::AlreadyRunning) => StepOutcome::AlreadyRunning,
            _ => StepOutcome::Started,
        };
        self.succeed(StepReport::new(Step::StartCrawler, &spec.crawler.name, started), result);

        self.poll_step(run, result).await;
    }

    async fn ensure_step(
        &self,
        step: Step,
        spec: ResourceSpec,
        result: &mut PipelineResult,
    ) -> Option<ResourceHandle> {
        let name = spec.name().to_string();
        match ensure(self.client, spec).await {
            Ok(handle) => {
                let outcome = if handle.existed_before() {
                    StepOutcome::NoOp
                } else {
                    StepOutcome::Created
                };
                self.succeed(StepReport::new(step, name, outcome), result);
                Some(handle)
            }
            Err(e) => {
                self.fail_with(step, &name, &e, result);
                None
            }
        }
    }

    async fn poll_step(&self, run: JobRun, result: &mut PipelineResult) {
        let job_name = run.job_name().to_string();
        match self.poller().poll(run).await {
            Ok(run) => {
                let outcome = run.outcome().unwrap_or(JobOutcome::TimedOut);
                let report = StepReport::new(Step::PollCrawler, &job_name, StepOutcome::Finished(outcome));
                self.reporter.report_step(&report);
                result.record(report);
                result.job = Some(run);
            }
            Err(e) => self.fail_with(Step::PollCrawler, &job_name, &e, result),
        }
    }

    fn poller(&self) -> JobPoller<'a, C> {
        let poller = JobPoller::new(self.client);
        match &self.cancel {
            Some(token) => poller.with_cancellation(token.clone()),
            None => poller,
        }
    }

    /// Sleep for `delay`; `false` when cancelled first
    async fn wait(&self, delay: Duration) -> bool {
        match &self.cancel {
            Some(token) => tokio::select! {
                _ = tokio::time::sleep(delay) => true,
                _ = token.cancelled() => false,
            },
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }

    fn succeed(&self, report: StepReport, result: &mut PipelineResult) {
        self.reporter.report_step(&report);
        result.record(report);
    }

    fn fail_with(&self, step: Step, resource: &str, err: &ProvisionError, result: &mut PipelineResult) {
        let hint = err.aws_error().and_then(|e| e.suggestion());
        self.fail(step, resource, error_chain(err), hint, result);
    }

    fn fail(
        &self,
        step: Step,
        resource: &str,
        message: String,
        hint: Option<String>,
        result: &mut PipelineResult,
    ) {
        let mut report = StepReport::new(step, resource, StepOutcome::Failed(message));
        report.hint = hint;
        self.reporter.report_step(&report);
        result.record(report);
    }
}
