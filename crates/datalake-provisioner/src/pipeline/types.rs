//! Pipeline inputs and results

use crate::poller::{JobRun, PollConfig};
use crate::resource::ResourceSpec;
use datalake_common::JobOutcome;
use serde::Serialize;
use std::time::Duration;

/// Crawler to create once the role ARN and database are known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlerPlan {
    pub name: String,
    /// S3 path the crawler scans, e.g. `s3://lake/raw/finanzas/`
    pub source_path: String,
    pub table_prefix: String,
}

/// Resource graph provisioned by [`super::Pipeline::provision`]
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    pub database: ResourceSpec,
    pub role: ResourceSpec,
    pub crawler: CrawlerPlan,
    pub poll: PollConfig,
    /// Wait after creating the role before a service may assume it
    pub role_propagation: Duration,
}

/// Pipeline steps in execution order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Step {
    EnsureDatabase,
    EnsureRole,
    EnsureCrawler,
    StartCrawler,
    PollCrawler,
}

/// What a step did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Resource already existed
    NoOp,
    Created,
    Started,
    /// Job was running before the start request
    AlreadyRunning,
    /// Polling ended with this outcome
    Finished(JobOutcome),
    /// Fatal error, rendered with its causes
    Failed(String),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        match self {
            Self::NoOp | Self::Created | Self::Started | Self::AlreadyRunning => true,
            Self::Finished(outcome) => outcome.is_success(),
            Self::Failed(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: Step,
    /// Name of the resource or job the step acted on
    pub resource: String,
    pub outcome: StepOutcome,
    /// How to fix a failed step, when the error is a known one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl StepReport {
    pub fn new(step: Step, resource: impl Into<String>, outcome: StepOutcome) -> Self {
        Self {
            step,
            resource: resource.into(),
            outcome,
            hint: None,
        }
    }
}

/// Aggregate result of a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineResult {
    pub steps: Vec<StepReport>,
    /// The observed job run, when polling happened
    pub job: Option<JobRun>,
    /// First step that failed; later steps were not attempted
    pub failed_step: Option<Step>,
}

impl PipelineResult {
    pub(crate) fn record(&mut self, report: StepReport) {
        if matches!(report.outcome, StepOutcome::Failed(_)) {
            self.failed_step.get_or_insert(report.step);
        }
        self.steps.push(report);
    }

    pub fn step(&self, step: Step) -> Option<&StepReport> {
        self.steps.iter().find(|r| r.step == step)
    }

    /// Terminal outcome of the job, if it was polled to the end
    pub fn job_outcome(&self) -> Option<JobOutcome> {
        self.job.as_ref().and_then(JobRun::outcome)
    }

    /// Every step succeeded and the job ended ready
    pub fn is_success(&self) -> bool {
        self.failed_step.is_none()
            && self.steps.iter().all(|r| r.outcome.is_success())
            && self.job_outcome().is_some_and(JobOutcome::is_success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_outcome_success() {
        assert!(StepOutcome::NoOp.is_success());
        assert!(StepOutcome::AlreadyRunning.is_success());
        assert!(StepOutcome::Finished(JobOutcome::Ready).is_success());
        assert!(!StepOutcome::Finished(JobOutcome::TimedOut).is_success());
        assert!(!StepOutcome::Failed("boom".to_string()).is_success());
    }

    #[test]
    fn test_first_failure_is_kept() {
        let mut result = PipelineResult::default();
        result.record(StepReport::new(Step::EnsureDatabase, "db", StepOutcome::Created));
        result.record(StepReport::new(Step::EnsureRole, "role", StepOutcome::Failed("a".into())));
        result.record(StepReport::new(Step::EnsureCrawler, "c", StepOutcome::Failed("b".into())));

        assert_eq!(result.failed_step, Some(Step::EnsureRole));
        assert!(!result.is_success());
        assert_eq!(result.step(Step::EnsureDatabase).unwrap().outcome, StepOutcome::Created);
    }

    #[test]
    fn test_no_job_is_not_success() {
        let mut result = PipelineResult::default();
        result.record(StepReport::new(Step::EnsureDatabase, "db", StepOutcome::NoOp));
        assert!(result.failed_step.is_none());
        assert!(!result.is_success());
    }

    #[test]
    fn test_outcome_json_shape() {
        let json = serde_json::to_value(StepReport::new(
            Step::PollCrawler,
            "datalake_crawler",
            StepOutcome::Finished(JobOutcome::TimedOut),
        ))
        .unwrap();
        assert_eq!(json["step"], "poll_crawler");
        assert_eq!(json["outcome"]["status"], "finished");
        assert_eq!(json["outcome"]["detail"], "TIMEOUT");
        assert!(json.get("hint").is_none());

        let json = serde_json::to_value(StepOutcome::NoOp).unwrap();
        assert_eq!(json["status"], "no_op");
    }
}
