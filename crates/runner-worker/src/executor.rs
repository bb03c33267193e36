// Executor and Sandbox: the seam between the job runner and an isolation
// technology. The runner only ever sees these two traits.

use async_trait::async_trait;
use runner_common::{Capabilities, InfrastructureError, JobSpec, StepResult, StepSpec, TeardownError};

use crate::execution_context::ExecutionContext;

/// A factory for sandboxes, one per job run.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// What this executor can offer a scheduler.
    fn capabilities(&self) -> Capabilities;

    /// Provision a ready-to-use sandbox for `job`.
    ///
    /// On error nothing is left allocated. Implementations must tolerate
    /// concurrent calls for different jobs.
    async fn create_sandbox(
        &self,
        ctx: &ExecutionContext,
        job: &JobSpec,
    ) -> Result<Box<dyn Sandbox>, InfrastructureError>;
}

/// An isolated environment that holds state across the steps of one job.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Identifier of the underlying resource, for logs.
    fn id(&self) -> &str;

    /// Run one step to completion.
    ///
    /// A nonzero exit code is a normal result. Failures of the sandbox
    /// itself, including the context's deadline or cancellation, are
    /// reported through [`StepResult::error`] with whatever output was
    /// captured up to that point.
    async fn run_step(&self, ctx: &ExecutionContext, step: &StepSpec) -> StepResult;

    /// Release every resource held by the sandbox. Consumes the sandbox,
    /// so it can only be called once.
    async fn destroy(self: Box<Self>, ctx: &ExecutionContext) -> Result<(), TeardownError>;
}
