// Outcome of a single step.

use serde::Serialize;

use crate::constants::INFRASTRUCTURE_EXIT_CODE;
use crate::errors::InfrastructureError;

/// What a sandbox observed while running one step.
///
/// A nonzero `exit_code` with no `error` means the step ran and failed. A
/// present `error` means the step could not be run or its result could not
/// be observed; `exit_code` is then [`INFRASTRUCTURE_EXIT_CODE`] and the
/// output fields hold whatever was captured before the failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_error")]
    pub error: Option<InfrastructureError>,
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<InfrastructureError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_str(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl StepResult {
    /// The step ran to completion with the given exit code.
    pub fn completed(exit_code: i64, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            error: None,
        }
    }

    /// The step could not be run at all.
    pub fn infrastructure(error: InfrastructureError) -> Self {
        Self::infrastructure_with_output(error, String::new(), String::new())
    }

    /// The step's result could not be observed; keep the partial output.
    pub fn infrastructure_with_output(
        error: InfrastructureError,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            exit_code: INFRASTRUCTURE_EXIT_CODE,
            stdout: stdout.into(),
            stderr: stderr.into(),
            error: Some(error),
        }
    }

    /// Exit code zero and no infrastructure error.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }
}
