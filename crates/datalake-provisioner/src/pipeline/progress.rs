//! Progress reporting abstraction for the pipeline
//!
//! The driver only produces [`StepReport`]s and a [`PipelineResult`]; how
//! they are surfaced is up to the reporter.

use super::types::{PipelineResult, StepOutcome, StepReport};
use std::time::Duration;
use tracing::{info, warn};

/// Receives progress while a pipeline runs
pub trait ProvisionReporter: Send + Sync {
    /// A step finished, successfully or not
    fn report_step(&self, report: &StepReport);

    /// The driver waits for a new role to become usable
    fn report_propagation_wait(&self, role: &str, delay: Duration);

    /// The pipeline stopped, after its last step or its first failure
    fn report_finished(&self, result: &PipelineResult);
}

/// Reporter that emits tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl LogReporter {
    pub fn new() -> Self {
        Self
    }
}

impl ProvisionReporter for LogReporter {
    fn report_step(&self, report: &StepReport) {
        match &report.outcome {
            StepOutcome::Failed(message) => warn!(
                step = %report.step,
                resource = %report.resource,
                error = %message,
                hint = ?report.hint,
                "Step failed"
            ),
            outcome => info!(
                step = %report.step,
                resource = %report.resource,
                outcome = ?outcome,
                "Step done"
            ),
        }
    }

    fn report_propagation_wait(&self, role: &str, delay: Duration) {
        info!(role = %role, delay_secs = delay.as_secs(), "Waiting for IAM role propagation");
    }

    fn report_finished(&self, result: &PipelineResult) {
        if result.is_success() {
            info!(steps = result.steps.len(), "Pipeline succeeded");
        } else {
            warn!(
                failed_step = ?result.failed_step,
                job_outcome = ?result.job_outcome(),
                "Pipeline did not succeed"
            );
        }
    }
}
