// DockerEngine: ContainerEngine over the Docker Engine API (bollard).

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::StreamExt;
use std::time::Duration;

use super::container_info::{ContainerInfo, ExecConfig};
use super::engine::{ContainerEngine, EngineError, ExecOutput, ExecState, ExecStream};

/// Seconds bollard waits on a single API request.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Talks to a Docker daemon.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect to `docker_host`, or to the local daemon when unset.
    pub fn connect(docker_host: Option<&str>) -> Result<Self, EngineError> {
        let docker = match docker_host {
            Some(host) if host.starts_with("unix://") || host.starts_with('/') => {
                Docker::connect_with_socket(host, REQUEST_TIMEOUT_SECS, API_DEFAULT_VERSION)?
            }
            Some(host) => {
                Docker::connect_with_http(host, REQUEST_TIMEOUT_SECS, API_DEFAULT_VERSION)?
            }
            None => Docker::connect_with_local_defaults()?,
        };
        Ok(Self { docker })
    }

    /// Check the daemon answers.
    pub async fn ping(&self) -> Result<(), EngineError> {
        self.docker.ping().await?;
        Ok(())
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn pull_image(&self, image: &str) -> Result<(), EngineError> {
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        // The pull only completes once its progress stream is drained.
        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(item) = progress.next().await {
            item?;
        }
        Ok(())
    }

    async fn create_container(&self, info: &ContainerInfo) -> Result<String, EngineError> {
        let options = CreateContainerOptions {
            name: info.container_name.clone(),
            platform: None,
        };
        let config = Config {
            image: Some(info.image.clone()),
            cmd: Some(info.command.clone()),
            env: Some(info.environment.clone()),
            working_dir: Some(info.working_dir.clone()),
            tty: Some(false),
            host_config: Some(HostConfig {
                binds: Some(info.binds.clone()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let response = self.docker.create_container(Some(options), config).await?;
        Ok(response.id)
    }

    async fn start_container(&self, container_id: &str) -> Result<(), EngineError> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn create_exec(&self, container_id: &str, exec: &ExecConfig) -> Result<String, EngineError> {
        let options = CreateExecOptions {
            cmd: Some(exec.command.clone()),
            env: Some(exec.env.clone()),
            working_dir: Some(exec.working_dir.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };
        let created = self.docker.create_exec(container_id, options).await?;
        Ok(created.id)
    }

    async fn attach_exec(&self, exec_id: &str) -> Result<ExecStream, EngineError> {
        match self.docker.start_exec(exec_id, None::<StartExecOptions>).await? {
            StartExecResults::Attached { output, .. } => Ok(output
                .filter_map(|item| async move {
                    match item {
                        Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
                            Some(Ok(ExecOutput::StdOut(message)))
                        }
                        Ok(LogOutput::StdErr { message }) => Some(Ok(ExecOutput::StdErr(message))),
                        Ok(LogOutput::StdIn { .. }) => None,
                        Err(e) => Some(Err(EngineError::from(e))),
                    }
                })
                .boxed()),
            StartExecResults::Detached => Err(EngineError::Other(format!(
                "exec session {} started detached",
                exec_id
            ))),
        }
    }

    async fn inspect_exec(&self, exec_id: &str) -> Result<ExecState, EngineError> {
        let inspect = self.docker.inspect_exec(exec_id).await?;
        Ok(ExecState {
            running: inspect.running.unwrap_or(false),
            exit_code: inspect.exit_code,
        })
    }

    async fn stop_container(&self, container_id: &str, grace: Duration) -> Result<(), EngineError> {
        let options = StopContainerOptions {
            t: grace.as_secs() as i64,
        };
        self.docker.stop_container(container_id, Some(options)).await?;
        Ok(())
    }

    async fn remove_container(&self, container_id: &str, force: bool) -> Result<(), EngineError> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.docker.remove_container(container_id, Some(options)).await?;
        Ok(())
    }
}
