// JobReport: what happened during one job run.

use chrono::{DateTime, Utc};
use runner_common::{InfrastructureError, StepResult, TeardownError};
use std::fmt;

/// Lifecycle of a job run.
///
/// `Idle -> Running -> (Succeeded | Failed) -> Terminated`, or
/// `Idle -> Failed -> Terminated` when provisioning fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Succeeded,
    Failed,
    Terminated,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Idle => write!(f, "Idle"),
            JobState::Running => write!(f, "Running"),
            JobState::Succeeded => write!(f, "Succeeded"),
            JobState::Failed => write!(f, "Failed"),
            JobState::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Why a job did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    /// The sandbox misbehaved. `step` is `None` when provisioning failed.
    Infrastructure {
        step: Option<String>,
        error: InfrastructureError,
    },
    /// A step ran and exited nonzero.
    StepFailed { step: String, exit_code: i64 },
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobFailure::Infrastructure { step: None, error } => {
                write!(f, "sandbox creation failed: {}", error)
            }
            JobFailure::Infrastructure {
                step: Some(step),
                error,
            } => write!(f, "step '{}' hit an infrastructure error: {}", step, error),
            JobFailure::StepFailed { step, exit_code } => {
                write!(f, "step '{}' failed (exit={})", step, exit_code)
            }
        }
    }
}

/// The job's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(JobFailure),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded)
    }
}

/// One executed step and when it ran.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub name: String,
    pub result: StepResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Everything a caller learns about a finished job run.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: String,
    pub outcome: JobOutcome,
    pub steps: Vec<StepRecord>,
    /// Set when the sandbox could not be fully released. Never affects `outcome`.
    pub teardown_error: Option<TeardownError>,
    /// States visited, in order.
    pub states: Vec<JobState>,
}

impl JobReport {
    pub(crate) fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            outcome: JobOutcome::Succeeded,
            steps: Vec::new(),
            teardown_error: None,
            states: vec![JobState::Idle],
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        match &self.outcome {
            JobOutcome::Succeeded => None,
            JobOutcome::Failed(failure) => Some(failure),
        }
    }

    /// Names of the steps that were handed to the sandbox, in order.
    pub fn executed_steps(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// The most recent state.
    pub fn state(&self) -> JobState {
        self.states.last().copied().unwrap_or(JobState::Idle)
    }

    pub(crate) fn transition(&mut self, state: JobState) {
        self.states.push(state);
    }
}
