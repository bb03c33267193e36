// runner-worker: the job execution engine.
// Depends on `runner-sdk` and `runner-common`.
//
// Architecture:
//   Worker::run → JobSource::next_job → JobRunner::run
//     → Executor::create_sandbox → StepsRunner::run (Sandbox::run_step per step)
//     → Sandbox::destroy

pub mod container;
pub mod execution_context;
pub mod executor;
pub mod job_report;
pub mod job_runner;
pub mod job_source;
pub mod steps_runner;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use execution_context::ExecutionContext;
pub use executor::{Executor, Sandbox};
pub use job_report::{JobFailure, JobOutcome, JobReport, JobState, StepRecord};
pub use job_runner::JobRunner;
pub use job_source::{FileJobSource, JobSource, JobSubmitter, QueueJobSource};
pub use worker::{Worker, WorkerSummary};
