// StepsRunner: runs a job's steps in order inside one sandbox and stops at
// the first step that does not succeed.

use chrono::Utc;
use runner_common::{InfrastructureError, JobSpec};
use runner_sdk::TraceWriter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::execution_context::ExecutionContext;
use crate::executor::Sandbox;
use crate::job_report::{JobFailure, JobOutcome, StepRecord};

/// Executes all steps in a job, in order.
pub struct StepsRunner {
    trace: Arc<dyn TraceWriter>,
}

impl StepsRunner {
    pub fn new(trace: Arc<dyn TraceWriter>) -> Self {
        Self { trace }
    }

    /// Run every step of `job` in `sandbox`, appending one record per
    /// executed step. Each step gets the full job timeout as its deadline.
    pub async fn run(
        &self,
        sandbox: &dyn Sandbox,
        job: &JobSpec,
        cancel: &CancellationToken,
        records: &mut Vec<StepRecord>,
    ) -> JobOutcome {
        for step in &job.steps {
            if cancel.is_cancelled() {
                self.trace
                    .info(&format!("Skipping step '{}' due to job cancellation.", step.name));
                return JobOutcome::Failed(JobFailure::Infrastructure {
                    step: Some(step.name.clone()),
                    error: InfrastructureError::Cancelled,
                });
            }

            self.trace.info(&format!("Running step: {}", step.name));
            let ctx = ExecutionContext::new(cancel.child_token()).with_timeout(job.timeout);

            let started_at = Utc::now();
            let result = sandbox.run_step(&ctx, step).await;
            let finished_at = Utc::now();

            if !result.stdout.is_empty() {
                self.trace
                    .info(&format!("[{}] stdout:\n{}", step.name, result.stdout.trim_end()));
            }
            if !result.stderr.is_empty() {
                self.trace
                    .info(&format!("[{}] stderr:\n{}", step.name, result.stderr.trim_end()));
            }

            let error = result.error.clone();
            let exit_code = result.exit_code;
            records.push(StepRecord {
                name: step.name.clone(),
                result,
                started_at,
                finished_at,
            });

            if let Some(error) = error {
                if error.is_interruption() {
                    self.trace
                        .warning(&format!("[{}] interrupted: {}", step.name, error));
                } else {
                    self.trace
                        .error(&format!("[{}] infrastructure error: {}", step.name, error));
                }
                return JobOutcome::Failed(JobFailure::Infrastructure {
                    step: Some(step.name.clone()),
                    error,
                });
            }
            if exit_code != 0 {
                self.trace
                    .error(&format!("[{}] Failed (exit={})", step.name, exit_code));
                return JobOutcome::Failed(JobFailure::StepFailed {
                    step: step.name.clone(),
                    exit_code,
                });
            }

            self.trace.info(&format!("[{}] Succeeded", step.name));
        }

        JobOutcome::Succeeded
    }
}
