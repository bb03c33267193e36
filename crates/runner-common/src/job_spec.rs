// Job model: the immutable description of one job run.
// Decoded from YAML/JSON by the job source and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use crate::constants::DEFAULT_STEP_WORKDIR;

/// Timeout applied when the document does not set one.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(60 * 60);

fn default_timeout() -> Duration {
    DEFAULT_JOB_TIMEOUT
}

/// A job: an ordered list of steps sharing one sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Unique ID for this job.
    pub job_id: String,

    /// Host-side directory mounted read-write into the sandbox.
    pub workspace: String,

    /// Job-level environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Steps in execution order.
    #[serde(default)]
    pub steps: Vec<StepSpec>,

    /// Deadline applied to each step.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

/// One command executed inside the job's sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Step name, unique within its job.
    pub name: String,

    /// Image reference. Only the first step's image provisions a container sandbox.
    #[serde(default)]
    pub image: String,

    /// Program followed by its arguments.
    #[serde(default)]
    pub command: Vec<String>,

    /// Overrides merged over the job environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Working directory inside the sandbox.
    #[serde(default, alias = "working_directory")]
    pub workdir: String,
}

/// Why a job document was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobSpecError {
    #[error("job_id must not be empty")]
    EmptyJobId,

    #[error("job has no steps")]
    NoSteps,

    #[error("step #{0} has no name")]
    EmptyStepName(usize),

    #[error("step name '{0}' is used more than once")]
    DuplicateStepName(String),

    #[error("step '{0}' has an empty command")]
    EmptyCommand(String),

    #[error("first step '{0}' must name an image")]
    MissingImage(String),

    #[error("job timeout must be greater than zero")]
    ZeroTimeout,
}

impl JobSpec {
    /// Create a job with an empty environment and the default timeout.
    pub fn new(job_id: impl Into<String>, workspace: impl Into<String>, steps: Vec<StepSpec>) -> Self {
        Self {
            job_id: job_id.into(),
            workspace: workspace.into(),
            env: BTreeMap::new(),
            steps,
            timeout: DEFAULT_JOB_TIMEOUT,
        }
    }

    /// Set one job-level environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the per-step deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the structural rules every runnable job must satisfy.
    pub fn validate(&self) -> Result<(), JobSpecError> {
        if self.job_id.trim().is_empty() {
            return Err(JobSpecError::EmptyJobId);
        }
        if self.timeout.is_zero() {
            return Err(JobSpecError::ZeroTimeout);
        }

        let first = self.steps.first().ok_or(JobSpecError::NoSteps)?;
        if first.image.trim().is_empty() {
            return Err(JobSpecError::MissingImage(first.name.clone()));
        }

        let mut seen = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if step.name.trim().is_empty() {
                return Err(JobSpecError::EmptyStepName(index + 1));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(JobSpecError::DuplicateStepName(step.name.clone()));
            }
            if step.command.is_empty() {
                return Err(JobSpecError::EmptyCommand(step.name.clone()));
            }
        }
        Ok(())
    }

    /// Image used to provision the sandbox: the first step's.
    pub fn sandbox_image(&self) -> Option<&str> {
        self.steps.first().map(|s| s.image.as_str())
    }

    /// Job environment with the step's overrides applied on top.
    pub fn step_env(&self, step: &StepSpec) -> BTreeMap<String, String> {
        let mut env = self.env.clone();
        env.extend(step.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }
}

impl StepSpec {
    pub fn new<I, S>(name: impl Into<String>, image: impl Into<String>, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            image: image.into(),
            command: command.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
            workdir: String::new(),
        }
    }

    /// The working directory, falling back to the workspace mount.
    pub fn effective_workdir(&self) -> &str {
        if self.workdir.trim().is_empty() {
            DEFAULT_STEP_WORKDIR
        } else {
            &self.workdir
        }
    }
}

/// Render an environment map as `KEY=VALUE` entries.
pub fn env_to_list(env: &BTreeMap<String, String>) -> Vec<String> {
    env.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
}
