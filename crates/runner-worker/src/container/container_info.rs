// ContainerInfo: the description of the long-lived container that backs
// one job. Built from the job document before anything touches the engine.

use runner_common::constants::container::{KEEP_ALIVE_COMMAND, NAME_PREFIX, WORKSPACE_MOUNT};
use runner_common::job_spec::env_to_list;
use runner_common::JobSpec;

/// Everything the engine needs to create a job container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Image the container is created from (the first step's image).
    pub image: String,

    /// Container name, `Job-<job id>`.
    pub container_name: String,

    /// Job-level environment as `KEY=VALUE` entries.
    pub environment: Vec<String>,

    /// Volume binds in `host:container` form.
    pub binds: Vec<String>,

    /// Default working directory.
    pub working_dir: String,

    /// Keep-alive command so steps can be exec'd into the container.
    pub command: Vec<String>,
}

impl ContainerInfo {
    /// Describe the container for `job`. The job must already be valid.
    pub fn for_job(job: &JobSpec) -> Self {
        Self {
            image: job.sandbox_image().unwrap_or_default().to_string(),
            container_name: container_name_for(&job.job_id),
            environment: env_to_list(&job.env),
            binds: vec![format!("{}:{}", job.workspace, WORKSPACE_MOUNT)],
            working_dir: WORKSPACE_MOUNT.to_string(),
            command: KEEP_ALIVE_COMMAND.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// One exec session inside a running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecConfig {
    pub command: Vec<String>,
    pub env: Vec<String>,
    pub working_dir: String,
}

/// Container name for a job. Characters Docker rejects in names become `-`.
pub fn container_name_for(job_id: &str) -> String {
    let safe: String = job_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{}{}", NAME_PREFIX, safe)
}
