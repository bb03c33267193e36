// JobRunner: drives one job through the Idle -> Running -> verdict ->
// Terminated lifecycle. Provisions a sandbox, hands the steps to the
// StepsRunner, and always destroys the sandbox afterwards.

use futures::FutureExt;
use runner_common::JobSpec;
use runner_sdk::{TraceWriter, TracingTraceWriter};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::execution_context::ExecutionContext;
use crate::executor::Executor;
use crate::job_report::{JobFailure, JobOutcome, JobReport, JobState};
use crate::steps_runner::StepsRunner;

/// Budget for tearing a sandbox down once the job has finished.
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs jobs against one executor. Safe to share between concurrent runs.
pub struct JobRunner {
    executor: Arc<dyn Executor>,
    trace: Arc<dyn TraceWriter>,
    teardown_timeout: Duration,
}

impl JobRunner {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            trace: Arc::new(TracingTraceWriter::new("JobRunner")),
            teardown_timeout: DEFAULT_TEARDOWN_TIMEOUT,
        }
    }

    pub fn with_trace(mut self, trace: Arc<dyn TraceWriter>) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout = timeout;
        self
    }

    /// Run `job` to completion.
    ///
    /// Never returns an error: every failure is folded into the report.
    /// Once a sandbox exists it is destroyed exactly once, after the last
    /// step has returned, whatever the steps did.
    pub async fn run(&self, job: &JobSpec, cancel: CancellationToken) -> JobReport {
        let mut report = JobReport::new(job.job_id.clone());
        self.trace.info(&format!(
            "Starting job {} using executor {}",
            job.job_id,
            self.executor.name()
        ));

        let create_ctx = ExecutionContext::new(cancel.clone());
        let sandbox = match self.executor.create_sandbox(&create_ctx, job).await {
            Ok(sandbox) => sandbox,
            Err(e) => {
                self.trace
                    .error(&format!("Job {}: sandbox creation failed: {}", job.job_id, e));
                report.outcome = JobOutcome::Failed(JobFailure::Infrastructure {
                    step: None,
                    error: e,
                });
                report.transition(JobState::Failed);
                report.transition(JobState::Terminated);
                return report;
            }
        };
        report.transition(JobState::Running);
        self.trace.info(&format!(
            "Job {}: sandbox {} ready",
            job.job_id,
            sandbox.id()
        ));

        let steps_runner = StepsRunner::new(Arc::clone(&self.trace));
        let steps = AssertUnwindSafe(steps_runner.run(sandbox.as_ref(), job, &cancel, &mut report.steps))
            .catch_unwind()
            .await;

        // Teardown runs on its own token so a cancelled job still releases
        // its sandbox.
        let teardown_ctx =
            ExecutionContext::new(CancellationToken::new()).with_timeout(self.teardown_timeout);
        if let Err(e) = sandbox.destroy(&teardown_ctx).await {
            self.trace
                .error(&format!("Job {}: Destroy failed: {}", job.job_id, e));
            report.teardown_error = Some(e);
        }

        let outcome = match steps {
            Ok(outcome) => outcome,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        match &outcome {
            JobOutcome::Succeeded => {
                report.transition(JobState::Succeeded);
                self.trace.info(&format!("Job {} succeeded", job.job_id));
            }
            JobOutcome::Failed(failure) => {
                report.transition(JobState::Failed);
                self.trace
                    .error(&format!("Job {} failed: {}", job.job_id, failure));
            }
        }
        report.outcome = outcome;
        report.transition(JobState::Terminated);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeExecutor;
    use runner_common::{InfrastructureError, StepResult, StepSpec, TeardownError};
    use runner_sdk::{CollectingTraceWriter, TraceLevel};

    fn three_step_job() -> JobSpec {
        JobSpec::new(
            "job-1",
            "/tmp/ws",
            vec![
                StepSpec::new("checkout", "alpine:3.19", ["true"]),
                StepSpec::new("build", "alpine:3.19", ["make"]),
                StepSpec::new("test", "alpine:3.19", ["make", "test"]),
            ],
        )
    }

    fn runner(executor: &Arc<FakeExecutor>) -> JobRunner {
        JobRunner::new(executor.clone()).with_trace(Arc::new(CollectingTraceWriter::new()))
    }

    #[tokio::test]
    async fn all_steps_succeed() {
        let executor = Arc::new(FakeExecutor::new());
        let report = runner(&executor).run(&three_step_job(), CancellationToken::new()).await;

        assert!(report.succeeded());
        assert_eq!(report.executed_steps(), vec!["checkout", "build", "test"]);
        assert_eq!(executor.destroy_calls(), 1);
        assert!(report.teardown_error.is_none());
        assert_eq!(
            report.states,
            vec![JobState::Idle, JobState::Running, JobState::Succeeded, JobState::Terminated]
        );
        assert!(report.steps.iter().all(|s| s.finished_at >= s.started_at));
    }

    #[tokio::test]
    async fn stops_at_first_failing_step() {
        let executor = Arc::new(
            FakeExecutor::new().with_result("build", StepResult::completed(1, "", "make: *** error")),
        );
        let report = runner(&executor).run(&three_step_job(), CancellationToken::new()).await;

        assert_eq!(
            report.outcome,
            JobOutcome::Failed(JobFailure::StepFailed {
                step: "build".into(),
                exit_code: 1
            })
        );
        assert_eq!(executor.executed_steps(), vec!["checkout", "build"]);
        assert_eq!(report.steps[1].result.stderr, "make: *** error");
        assert_eq!(executor.destroy_calls(), 1);
        assert_eq!(report.state(), JobState::Terminated);
    }

    #[tokio::test]
    async fn fails_fast_at_any_position() {
        let job = three_step_job();
        for (k, failing) in job.steps.iter().enumerate() {
            let executor = Arc::new(
                FakeExecutor::new().with_result(&failing.name, StepResult::completed(2, "", "")),
            );
            let report = runner(&executor).run(&job, CancellationToken::new()).await;

            let expected: Vec<&str> = job.steps[..=k].iter().map(|s| s.name.as_str()).collect();
            assert_eq!(executor.executed_steps(), expected, "failing step {}", failing.name);
            assert_eq!(
                report.outcome,
                JobOutcome::Failed(JobFailure::StepFailed {
                    step: failing.name.clone(),
                    exit_code: 2
                })
            );
            assert_eq!(executor.destroy_calls(), 1);
        }
    }

    #[tokio::test]
    async fn cancellation_between_steps_skips_the_rest() {
        let trace = Arc::new(CollectingTraceWriter::new());
        let cancel = CancellationToken::new();
        let executor = Arc::new(FakeExecutor::new().cancelling_after("checkout", cancel.clone()));
        let runner = JobRunner::new(executor.clone()).with_trace(trace.clone());

        let report = runner.run(&three_step_job(), cancel).await;

        assert_eq!(
            report.outcome,
            JobOutcome::Failed(JobFailure::Infrastructure {
                step: Some("build".into()),
                error: InfrastructureError::Cancelled,
            })
        );
        assert_eq!(executor.executed_steps(), vec!["checkout"]);
        assert_eq!(report.executed_steps(), vec!["checkout"]);
        assert_eq!(executor.destroy_calls(), 1);
        assert!(trace.contains(TraceLevel::Info, "Skipping step 'build'"));
    }

    #[tokio::test]
    async fn infrastructure_error_fails_the_job() {
        let executor = Arc::new(FakeExecutor::new().with_result(
            "checkout",
            StepResult::infrastructure(InfrastructureError::ExecCreate("daemon gone".into())),
        ));
        let report = runner(&executor).run(&three_step_job(), CancellationToken::new()).await;

        assert!(matches!(
            report.failure(),
            Some(JobFailure::Infrastructure { step: Some(step), error: InfrastructureError::ExecCreate(_) })
                if step == "checkout"
        ));
        assert_eq!(report.executed_steps(), vec!["checkout"]);
        assert_eq!(executor.destroy_calls(), 1);
    }

    #[tokio::test]
    async fn sandbox_creation_failure_runs_nothing() {
        let executor = Arc::new(FakeExecutor::new().with_create_error(InfrastructureError::ImagePull {
            image: "alpine:3.19".into(),
            message: "manifest unknown".into(),
        }));
        let report = runner(&executor).run(&three_step_job(), CancellationToken::new()).await;

        assert!(matches!(
            report.failure(),
            Some(JobFailure::Infrastructure { step: None, error: InfrastructureError::ImagePull { .. } })
        ));
        assert!(executor.executed_steps().is_empty());
        assert_eq!(executor.destroy_calls(), 0);
        assert_eq!(
            report.states,
            vec![JobState::Idle, JobState::Failed, JobState::Terminated]
        );
    }

    #[tokio::test]
    async fn cancellation_mid_step_still_destroys_once() {
        let trace = Arc::new(CollectingTraceWriter::new());
        let executor = Arc::new(FakeExecutor::new().blocking_on("build"));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let report = JobRunner::new(executor.clone())
            .with_trace(trace.clone())
            .run(&three_step_job(), cancel)
            .await;

        assert_eq!(
            report.outcome,
            JobOutcome::Failed(JobFailure::Infrastructure {
                step: Some("build".into()),
                error: InfrastructureError::Cancelled,
            })
        );
        assert_eq!(report.steps[1].result.stdout, "partial");
        assert_eq!(executor.executed_steps(), vec!["checkout", "build"]);
        assert!(trace.contains(TraceLevel::Warning, "[build] interrupted"));
        assert_eq!(executor.destroy_calls(), 1);
        assert!(!executor.state.lock().destroyed_during_step);
    }

    #[tokio::test(start_paused = true)]
    async fn step_deadline_is_the_job_timeout() {
        let executor = Arc::new(FakeExecutor::new().blocking_on("checkout"));
        let job = three_step_job().with_timeout(Duration::from_secs(30));

        let report = runner(&executor).run(&job, CancellationToken::new()).await;

        assert!(matches!(
            report.failure(),
            Some(JobFailure::Infrastructure {
                error: InfrastructureError::DeadlineExceeded(d),
                ..
            }) if *d == Duration::from_secs(30)
        ));
        assert_eq!(executor.destroy_calls(), 1);
    }

    #[tokio::test]
    async fn already_cancelled_job_never_provisions() {
        let executor = Arc::new(FakeExecutor::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = runner(&executor).run(&three_step_job(), cancel).await;
        assert!(matches!(
            report.failure(),
            Some(JobFailure::Infrastructure { step: None, error: InfrastructureError::Cancelled })
        ));
        assert_eq!(executor.sandboxes_created(), 0);
    }

    #[tokio::test]
    async fn teardown_failure_does_not_change_verdict() {
        let trace = Arc::new(CollectingTraceWriter::new());
        let executor = Arc::new(FakeExecutor::new().with_destroy_error(TeardownError::Remove {
            container: "c1".into(),
            message: "device busy".into(),
        }));
        let runner = JobRunner::new(executor.clone()).with_trace(trace.clone());

        let report = runner.run(&three_step_job(), CancellationToken::new()).await;

        assert!(report.succeeded());
        assert!(matches!(report.teardown_error, Some(TeardownError::Remove { .. })));
        assert!(trace.contains(TraceLevel::Error, "Destroy failed"));
        assert_eq!(executor.destroy_calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_jobs_get_their_own_sandboxes() {
        let executor = Arc::new(FakeExecutor::new());
        let runner = runner(&executor);

        let first = three_step_job();
        let mut second = three_step_job();
        second.job_id = "job-2".into();

        let (a, b) = tokio::join!(
            runner.run(&first, CancellationToken::new()),
            runner.run(&second, CancellationToken::new())
        );

        assert!(a.succeeded() && b.succeeded());
        assert_eq!(executor.sandboxes_created(), 2);
        assert_eq!(executor.destroy_calls(), 2);
        assert_eq!(executor.executed_steps().len(), 6);
    }
}
