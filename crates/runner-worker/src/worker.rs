// Worker: pulls jobs from a JobSource and runs them one at a time until the
// source is exhausted or the runner is asked to shut down.
//
// Shutdown only stops the worker from taking new jobs; the in-flight job is
// interrupted by the separate job cancellation token.

use runner_sdk::{TraceWriter, TracingTraceWriter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::job_report::JobReport;
use crate::job_runner::JobRunner;
use crate::job_source::JobSource;

/// Totals for one worker session. Reports are not kept; each job's verdict
/// and teardown error are logged as it finishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs the source could not produce (unreadable or invalid).
    pub rejected: usize,
}

impl WorkerSummary {
    fn record(&mut self, report: &JobReport) {
        if report.succeeded() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Jobs that were started, whatever their verdict.
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Whether every job that was offered ran and succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.rejected == 0
    }
}

pub struct Worker {
    runner: JobRunner,
    source: Arc<dyn JobSource>,
    trace: Arc<dyn TraceWriter>,
}

impl Worker {
    pub fn new(runner: JobRunner, source: Arc<dyn JobSource>) -> Self {
        Self {
            runner,
            source,
            trace: Arc::new(TracingTraceWriter::new("Worker")),
        }
    }

    pub fn with_trace(mut self, trace: Arc<dyn TraceWriter>) -> Self {
        self.trace = trace;
        self
    }

    /// Run jobs until the source is exhausted or `shutdown` fires.
    pub async fn run(
        &self,
        shutdown: CancellationToken,
        job_cancel: CancellationToken,
    ) -> WorkerSummary {
        let mut summary = WorkerSummary::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.trace.info("Shutdown requested, no longer accepting jobs.");
                    break;
                }
                next = self.source.next_job() => next,
            };

            let job = match next {
                Ok(Some(job)) => job,
                Ok(None) => {
                    self.trace.info("No more jobs.");
                    break;
                }
                Err(e) => {
                    self.trace.error(&format!("Rejected job: {:#}", e));
                    summary.rejected += 1;
                    continue;
                }
            };

            self.trace.info(&format!("Running job {}", job.job_id));
            let report = self.runner.run(&job, job_cancel.child_token()).await;
            summary.record(&report);
        }

        self.trace.info(&format!(
            "Worker finished: {} succeeded, {} failed, {} rejected",
            summary.succeeded, summary.failed, summary.rejected
        ));
        summary
    }
}
