//! Start a remote job and poll it to a terminal state
//!
//! The poller sleeps exactly `interval` between status reads and counts the
//! budget in intervals, not in wall-clock time. Running out of budget ends
//! the local wait with [`JobOutcome::TimedOut`]; the remote job keeps
//! running. Cancelling through a [`CancellationToken`] also only stops the
//! local wait.

use crate::error::ProvisionError;
use crate::resource::{ResourceClient, StartOutcome};
use chrono::{DateTime, Utc};
use datalake_common::defaults::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_TIMEOUT_SECS};
use datalake_common::{JobOutcome, JobState};
use serde::{Serialize, Serializer};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Polling budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Total time to wait for a terminal state
    pub timeout: Duration,
    /// Sleep between two status reads; must not be zero
    pub interval: Duration,
}

impl PollConfig {
    /// Reject an interval that could not bound the number of polls
    pub fn check(&self, job_name: &str) -> Result<(), ProvisionError> {
        if self.interval.is_zero() {
            return Err(ProvisionError::ZeroInterval {
                job: job_name.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS),
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// One observed run of a remote job.
///
/// Only the poller changes it. Once `outcome` is set the run is finished
/// and no further state is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRun {
    job_name: String,
    state: JobState,
    outcome: Option<JobOutcome>,
    start: Option<StartOutcome>,
    started_at: DateTime<Utc>,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    elapsed: Duration,
    #[serde(rename = "timeout_secs", serialize_with = "as_secs")]
    timeout: Duration,
    #[serde(skip)]
    interval: Duration,
    polls: u32,
}

impl JobRun {
    /// A run that has not been started or observed yet
    pub fn new(job_name: impl Into<String>, config: PollConfig) -> Self {
        Self {
            job_name: job_name.into(),
            state: JobState::NotStarted,
            outcome: None,
            start: None,
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            timeout: config.timeout,
            interval: config.interval,
            polls: 0,
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Last observed state
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Terminal outcome, `None` while the run is still being observed
    pub fn outcome(&self) -> Option<JobOutcome> {
        self.outcome
    }

    /// How the job was started, `None` when it was only watched
    pub fn start_outcome(&self) -> Option<StartOutcome> {
        self.start
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Budget consumed so far, in whole intervals
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            timeout: self.timeout,
            interval: self.interval,
        }
    }

    /// Number of status reads
    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_some_and(JobOutcome::is_success)
    }

    fn finish(&mut self, outcome: JobOutcome) {
        self.outcome = Some(outcome);
    }
}

/// Drives a job through [`ResourceClient::start_job`] and
/// [`ResourceClient::get_status`]
pub struct JobPoller<'a, C> {
    client: &'a C,
    cancel: Option<CancellationToken>,
}

impl<'a, C: ResourceClient> JobPoller<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            cancel: None,
        }
    }

    /// Stop waiting when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Start `job_name` and poll it until it finishes or the budget runs out
    pub async fn run(
        &self,
        job_name: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Result<JobRun, ProvisionError> {
        let run = self.start(job_name, PollConfig { timeout, interval }).await?;
        self.poll(run).await
    }

    /// Ask the remote side to start the job.
    ///
    /// A job that is already running counts as started: the returned run is
    /// `RUNNING` in both cases.
    pub async fn start(&self, job_name: &str, config: PollConfig) -> Result<JobRun, ProvisionError> {
        config.check(job_name)?;
        let mut run = JobRun::new(job_name, config);

        let start = self
            .client
            .start_job(job_name)
            .await
            .map_err(|source| ProvisionError::Start {
                job: job_name.to_string(),
                source,
            })?;

        match start {
            StartOutcome::Started => info!(job = %job_name, "Job started"),
            StartOutcome::AlreadyRunning => {
                info!(job = %job_name, "Job already running, waiting for the current run")
            }
        }

        run.start = Some(start);
        run.state = JobState::Running;
        Ok(run)
    }

    /// Poll until a terminal state is reported or the budget is spent.
    ///
    /// `READY`, `FAILED` and `UNKNOWN` end the run on the first read. A job
    /// that reports `NOT_STARTED` while being waited on is not making progress
    /// and ends the run as [`JobOutcome::Unknown`].
    pub async fn poll(&self, mut run: JobRun) -> Result<JobRun, ProvisionError> {
        if run.is_finished() {
            return Ok(run);
        }
        run.poll_config().check(&run.job_name)?;

        while run.elapsed < run.timeout {
            let state = self.read_state(&run.job_name).await?;
            run.polls += 1;
            run.state = state;

            if !state.is_in_progress() {
                let outcome = JobOutcome::from_state(state).unwrap_or(JobOutcome::Unknown);
                run.finish(outcome);
                if outcome.is_success() {
                    info!(job = %run.job_name, polls = run.polls, elapsed_secs = run.elapsed.as_secs(), "Job finished");
                } else {
                    warn!(job = %run.job_name, state = %state, polls = run.polls, "Job ended without success");
                }
                return Ok(run);
            }

            debug!(
                job = %run.job_name,
                state = %state,
                elapsed_secs = run.elapsed.as_secs(),
                timeout_secs = run.timeout.as_secs(),
                "Job in progress"
            );
            self.sleep(&run.job_name, run.interval).await?;
            run.elapsed += run.interval;
        }

        warn!(
            job = %run.job_name,
            state = %run.state,
            timeout_secs = run.timeout.as_secs(),
            "Stopped waiting for job, it keeps running remotely"
        );
        run.finish(JobOutcome::TimedOut);
        Ok(run)
    }

    async fn read_state(&self, job_name: &str) -> Result<JobState, ProvisionError> {
        let status = tokio::select! {
            status = self.client.get_status(job_name) => status,
            _ = cancelled(self.cancel.as_ref()) => {
                return Err(ProvisionError::Cancelled { job: job_name.to_string() });
            }
        };
        status.map_err(|source| ProvisionError::Status {
            job: job_name.to_string(),
            source,
        })
    }

    async fn sleep(&self, job_name: &str, interval: Duration) -> Result<(), ProvisionError> {
        tokio::select! {
            _ = tokio::time::sleep(interval) => Ok(()),
            _ = cancelled(self.cancel.as_ref()) => {
                Err(ProvisionError::Cancelled { job: job_name.to_string() })
            }
        }
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}
