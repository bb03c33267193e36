// Error taxonomy of the execution engine.
//
// A step that runs and exits nonzero is *not* an error here; it is carried as
// a plain exit code on the step result. These types cover the cases where the
// sandbox itself misbehaved.

use std::time::Duration;

use crate::job_spec::JobSpecError;

/// The sandbox could not be provisioned or operated, or an operation ran past
/// its deadline. Always aborts the job run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InfrastructureError {
    #[error("invalid job specification: {0}")]
    InvalidJob(#[from] JobSpecError),

    #[error("workspace '{path}' is not usable: {reason}")]
    Workspace { path: String, reason: String },

    #[error("failed to pull image '{image}': {message}")]
    ImagePull { image: String, message: String },

    #[error("failed to create container '{name}': {message}")]
    ContainerCreate { name: String, message: String },

    #[error("failed to start container {container}: {message}")]
    ContainerStart { container: String, message: String },

    #[error("failed to create exec session: {0}")]
    ExecCreate(String),

    #[error("failed to attach to exec session: {0}")]
    ExecAttach(String),

    #[error("failed to read exec output: {0}")]
    OutputStream(String),

    #[error("failed to inspect exec session: {0}")]
    ExecInspect(String),

    #[error("exec session finished without reporting an exit code")]
    MissingExitCode,

    #[error("operation exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("operation was cancelled")]
    Cancelled,
}

impl InfrastructureError {
    /// Whether this error was produced by a deadline or a cancellation rather
    /// than by the isolation layer itself.
    pub fn is_interruption(&self) -> bool {
        matches!(
            self,
            InfrastructureError::DeadlineExceeded(_) | InfrastructureError::Cancelled
        )
    }
}

/// A sandbox could not fully release its resources. Reported as a secondary
/// diagnostic; never changes a job's verdict.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TeardownError {
    #[error("failed to remove container {container}: {message}")]
    Remove { container: String, message: String },

    #[error("teardown interrupted before container {0} was removed")]
    Cancelled(String),
}
