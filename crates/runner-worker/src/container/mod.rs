// Container-backed executor: job containers driven through the Docker
// Engine API.

pub mod container_info;
pub mod docker_engine;
pub mod docker_executor;
pub mod engine;

pub use container_info::{ContainerInfo, ExecConfig};
pub use docker_engine::DockerEngine;
pub use docker_executor::{DockerExecutor, DockerSandbox};
pub use engine::{ContainerEngine, EngineError, ExecOutput, ExecState, ExecStream};
