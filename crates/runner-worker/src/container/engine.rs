// ContainerEngine: the handful of container runtime calls a job sandbox
// needs. The Docker implementation lives in `docker_engine`; tests script
// their own.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::time::Duration;

use super::container_info::{ContainerInfo, ExecConfig};

/// Error reported by a container engine call.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Docker(#[from] bollard::errors::Error),

    #[error("{0}")]
    Other(String),
}

/// One demultiplexed chunk of exec output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutput {
    StdOut(Bytes),
    StdErr(Bytes),
}

/// Output of an attached exec session, in arrival order.
pub type ExecStream = BoxStream<'static, Result<ExecOutput, EngineError>>;

/// Status of an exec session as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecState {
    pub running: bool,
    pub exit_code: Option<i64>,
}

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Make `image` available locally, pulling it when needed.
    async fn pull_image(&self, image: &str) -> Result<(), EngineError>;

    /// Create (but do not start) a container; returns its id.
    async fn create_container(&self, info: &ContainerInfo) -> Result<String, EngineError>;

    async fn start_container(&self, container_id: &str) -> Result<(), EngineError>;

    /// Register an exec session; returns its id.
    async fn create_exec(&self, container_id: &str, exec: &ExecConfig) -> Result<String, EngineError>;

    /// Start an exec session and attach to its output.
    async fn attach_exec(&self, exec_id: &str) -> Result<ExecStream, EngineError>;

    async fn inspect_exec(&self, exec_id: &str) -> Result<ExecState, EngineError>;

    /// Ask the container to stop, killing it after `grace`.
    async fn stop_container(&self, container_id: &str, grace: Duration) -> Result<(), EngineError>;

    async fn remove_container(&self, container_id: &str, force: bool) -> Result<(), EngineError>;
}
