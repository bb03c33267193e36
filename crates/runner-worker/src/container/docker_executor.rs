// DockerExecutor / DockerSandbox: one long-lived container per job, with
// each step run as an exec session inside it.

use async_trait::async_trait;
use futures::StreamExt;
use runner_common::constants::container::{DEFAULT_STOP_TIMEOUT_SECS, EXECUTOR_NAME};
use runner_common::job_spec::env_to_list;
use runner_common::{
    Capabilities, InfrastructureError, IsolationKind, JobSpec, StepResult, StepSpec, TeardownError,
};
use runner_sdk::{IOUtil, TraceWriter, TracingTraceWriter};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::container_info::{ContainerInfo, ExecConfig};
use super::engine::{ContainerEngine, EngineError, ExecOutput, ExecStream};
use crate::execution_context::ExecutionContext;
use crate::executor::{Executor, Sandbox};

/// Inspect attempts made while an exec still reports itself running.
const EXIT_CODE_POLL_ATTEMPTS: usize = 20;
const EXIT_CODE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Budget for a force remove. Runs on its own deadline so a slow stop or a
/// failed provision cannot skip it.
const REMOVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Slice of the teardown budget a stop never eats into.
const STOP_MARGIN: Duration = Duration::from_secs(5);

fn remove_context() -> ExecutionContext {
    ExecutionContext::new(CancellationToken::new()).with_timeout(REMOVE_TIMEOUT)
}

// ---------------------------------------------------------------------------
// DockerExecutor
// ---------------------------------------------------------------------------

/// Provisions container sandboxes through a [`ContainerEngine`].
pub struct DockerExecutor<E> {
    engine: Arc<E>,
    stop_timeout: Duration,
    capabilities: Capabilities,
    trace: Arc<dyn TraceWriter>,
}

impl<E: ContainerEngine + 'static> DockerExecutor<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
            stop_timeout: Duration::from_secs(DEFAULT_STOP_TIMEOUT_SECS),
            capabilities: Capabilities::from_host(IsolationKind::Container),
            trace: Arc::new(TracingTraceWriter::new("DockerExecutor")),
        }
    }

    /// Grace period a container gets between stop and kill.
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    pub fn with_trace(mut self, trace: Arc<dyn TraceWriter>) -> Self {
        self.trace = trace;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Best-effort removal of a container that never became a sandbox.
    /// Accepts an id or a name.
    async fn discard_container(&self, container: &str) {
        match remove_context().guard(self.engine.remove_container(container, true)).await {
            Ok(Ok(())) => self
                .trace
                .info(&format!("Removed container {} after failed provision", container)),
            Ok(Err(e)) => self
                .trace
                .warning(&format!("Failed to remove container {}: {}", container, e)),
            Err(e) => self
                .trace
                .warning(&format!("Failed to remove container {}: {}", container, e)),
        }
    }
}

#[async_trait]
impl<E: ContainerEngine + 'static> Executor for DockerExecutor<E> {
    fn name(&self) -> &str {
        EXECUTOR_NAME
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    async fn create_sandbox(
        &self,
        ctx: &ExecutionContext,
        job: &JobSpec,
    ) -> Result<Box<dyn Sandbox>, InfrastructureError> {
        job.validate()?;
        IOUtil::check_directory_accessible(Path::new(&job.workspace)).map_err(|e| {
            InfrastructureError::Workspace {
                path: job.workspace.clone(),
                reason: format!("{:#}", e),
            }
        })?;

        let info = ContainerInfo::for_job(job);

        self.trace.info(&format!("Pulling image {}", info.image));
        ctx.guard(self.engine.pull_image(&info.image))
            .await?
            .map_err(|e| InfrastructureError::ImagePull {
                image: info.image.clone(),
                message: e.to_string(),
            })?;

        // An interrupted create may still have landed on the daemon; only
        // the name is known then.
        let container_id = match ctx.guard(self.engine.create_container(&info)).await {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => {
                return Err(InfrastructureError::ContainerCreate {
                    name: info.container_name.clone(),
                    message: e.to_string(),
                })
            }
            Err(interrupted) => {
                self.discard_container(&info.container_name).await;
                return Err(interrupted);
            }
        };

        let started = match ctx.guard(self.engine.start_container(&container_id)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(InfrastructureError::ContainerStart {
                container: container_id.clone(),
                message: e.to_string(),
            }),
            Err(interrupted) => Err(interrupted),
        };
        if let Err(e) = started {
            self.discard_container(&container_id).await;
            return Err(e);
        }

        self.trace.info(&format!(
            "Started container {} ({})",
            info.container_name, container_id
        ));

        Ok(Box::new(DockerSandbox {
            engine: Arc::clone(&self.engine),
            container_id,
            container_name: info.container_name,
            job: job.clone(),
            stop_timeout: self.stop_timeout,
            trace: Arc::clone(&self.trace),
        }))
    }
}

// ---------------------------------------------------------------------------
// DockerSandbox
// ---------------------------------------------------------------------------

/// A started job container.
pub struct DockerSandbox<E> {
    engine: Arc<E>,
    container_id: String,
    container_name: String,
    job: JobSpec,
    stop_timeout: Duration,
    trace: Arc<dyn TraceWriter>,
}

impl<E: ContainerEngine> DockerSandbox<E> {
    fn exec_config(&self, step: &StepSpec) -> ExecConfig {
        ExecConfig {
            command: step.command.clone(),
            env: env_to_list(&self.job.step_env(step)),
            working_dir: step.effective_workdir().to_string(),
        }
    }

    /// Read the exit code once the output stream has closed. The engine can
    /// briefly report a finished exec as still running.
    async fn wait_exit_code(&self, exec_id: &str) -> Result<i64, InfrastructureError> {
        for _ in 0..EXIT_CODE_POLL_ATTEMPTS {
            let state = self
                .engine
                .inspect_exec(exec_id)
                .await
                .map_err(|e| InfrastructureError::ExecInspect(e.to_string()))?;
            match state.exit_code {
                Some(code) if !state.running => return Ok(code),
                None if !state.running => return Err(InfrastructureError::MissingExitCode),
                _ => tokio::time::sleep(EXIT_CODE_POLL_INTERVAL).await,
            }
        }
        Err(InfrastructureError::MissingExitCode)
    }
}

/// Output captured from one exec session.
#[derive(Debug, Default)]
struct CapturedOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl CapturedOutput {
    async fn drain(&mut self, mut stream: ExecStream) -> Result<(), EngineError> {
        while let Some(chunk) = stream.next().await {
            match chunk? {
                ExecOutput::StdOut(bytes) => self.stdout.extend_from_slice(&bytes),
                ExecOutput::StdErr(bytes) => self.stderr.extend_from_slice(&bytes),
            }
        }
        Ok(())
    }

    fn completed(self, exit_code: i64) -> StepResult {
        let (stdout, stderr) = self.into_strings();
        StepResult::completed(exit_code, stdout, stderr)
    }

    fn failed(self, error: InfrastructureError) -> StepResult {
        let (stdout, stderr) = self.into_strings();
        StepResult::infrastructure_with_output(error, stdout, stderr)
    }

    fn into_strings(self) -> (String, String) {
        (
            String::from_utf8_lossy(&self.stdout).into_owned(),
            String::from_utf8_lossy(&self.stderr).into_owned(),
        )
    }
}

#[async_trait]
impl<E: ContainerEngine + 'static> Sandbox for DockerSandbox<E> {
    fn id(&self) -> &str {
        &self.container_id
    }

    async fn run_step(&self, ctx: &ExecutionContext, step: &StepSpec) -> StepResult {
        let exec = self.exec_config(step);
        self.trace.verbose(&format!(
            "Exec in {}: {}",
            self.container_name,
            exec.command.join(" ")
        ));

        let exec_id = match ctx.guard(self.engine.create_exec(&self.container_id, &exec)).await {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => return StepResult::infrastructure(InfrastructureError::ExecCreate(e.to_string())),
            Err(interrupted) => return StepResult::infrastructure(interrupted),
        };

        let stream = match ctx.guard(self.engine.attach_exec(&exec_id)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return StepResult::infrastructure(InfrastructureError::ExecAttach(e.to_string())),
            Err(interrupted) => return StepResult::infrastructure(interrupted),
        };

        // Dropping the drain on interruption keeps what was already read.
        let mut output = CapturedOutput::default();
        match ctx.guard(output.drain(stream)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return output.failed(InfrastructureError::OutputStream(e.to_string())),
            Err(interrupted) => return output.failed(interrupted),
        }

        match ctx.guard(self.wait_exit_code(&exec_id)).await {
            Ok(Ok(code)) => output.completed(code),
            Ok(Err(e)) | Err(e) => output.failed(e),
        }
    }

    async fn destroy(self: Box<Self>, ctx: &ExecutionContext) -> Result<(), TeardownError> {
        self.trace
            .info(&format!("Stopping container {}", self.container_name));

        // The grace period is trimmed to the teardown budget; removal is
        // forced and runs on its own deadline, so a stop that fails or
        // overruns does not leak the container.
        let grace = match ctx.remaining() {
            Some(left) => self.stop_timeout.min(left.saturating_sub(STOP_MARGIN)),
            None => self.stop_timeout,
        };
        match ctx.guard(self.engine.stop_container(&self.container_id, grace)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.trace.warning(&format!(
                "Failed to stop container {}: {}",
                self.container_name, e
            )),
            Err(e) => self.trace.warning(&format!(
                "Stopping container {} interrupted: {}",
                self.container_name, e
            )),
        }

        match remove_context()
            .guard(self.engine.remove_container(&self.container_id, true))
            .await
        {
            Ok(Ok(())) => {
                self.trace
                    .info(&format!("Removed container {}", self.container_name));
                Ok(())
            }
            Ok(Err(e)) => Err(TeardownError::Remove {
                container: self.container_id.clone(),
                message: e.to_string(),
            }),
            Err(_) => Err(TeardownError::Cancelled(self.container_id.clone())),
        }
    }
}
