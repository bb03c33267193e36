// runner-common: Job model and shared services for the CI runner.
// Depends only on `runner-sdk`; the execution engine in `runner-worker`
// builds on the types defined here.

pub mod capabilities;
pub mod config_store;
pub mod constants;
pub mod errors;
pub mod host_context;
pub mod job_spec;
pub mod step_result;

// ---------------------------------------------------------------------------
// Re-exports for convenient access
// ---------------------------------------------------------------------------

pub use capabilities::{Capabilities, IsolationKind};
pub use config_store::{ConfigurationStore, RunnerSettings};
pub use constants::{Architecture, CURRENT_ARCHITECTURE, INFRASTRUCTURE_EXIT_CODE};
pub use errors::{InfrastructureError, TeardownError};
pub use host_context::{HostContext, ShutdownReason};
pub use job_spec::{JobSpec, JobSpecError, StepSpec};
pub use step_result::StepResult;
