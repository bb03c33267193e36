// Scripted doubles for the executor and container engine seams.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use runner_common::{
    Capabilities, InfrastructureError, IsolationKind, JobSpec, StepResult, StepSpec, TeardownError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::container::container_info::{ContainerInfo, ExecConfig};
use crate::container::engine::{ContainerEngine, EngineError, ExecOutput, ExecState, ExecStream};
use crate::execution_context::ExecutionContext;
use crate::executor::{Executor, Sandbox};

// ---------------------------------------------------------------------------
// FakeExecutor
// ---------------------------------------------------------------------------

/// Shared record of what the fake executor and its sandboxes were asked to do.
#[derive(Debug, Default)]
pub struct FakeState {
    pub executed_steps: Vec<String>,
    pub sandboxes_created: usize,
    pub destroy_calls: usize,
    pub destroyed_during_step: bool,
    step_in_flight: usize,
}

/// Executor whose sandboxes return scripted results.
#[derive(Default)]
pub struct FakeExecutor {
    pub results: HashMap<String, StepResult>,
    pub create_error: Option<InfrastructureError>,
    pub destroy_error: Option<TeardownError>,
    /// Step that blocks until its context is cancelled or expires.
    pub block_on: Option<String>,
    /// Cancel a token once the named step has finished.
    pub cancel_after: Option<(String, CancellationToken)>,
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, step: &str, result: StepResult) -> Self {
        self.results.insert(step.to_string(), result);
        self
    }

    pub fn with_create_error(mut self, error: InfrastructureError) -> Self {
        self.create_error = Some(error);
        self
    }

    pub fn with_destroy_error(mut self, error: TeardownError) -> Self {
        self.destroy_error = Some(error);
        self
    }

    pub fn blocking_on(mut self, step: &str) -> Self {
        self.block_on = Some(step.to_string());
        self
    }

    pub fn cancelling_after(mut self, step: &str, cancel: CancellationToken) -> Self {
        self.cancel_after = Some((step.to_string(), cancel));
        self
    }

    pub fn executed_steps(&self) -> Vec<String> {
        self.state.lock().executed_steps.clone()
    }

    pub fn destroy_calls(&self) -> usize {
        self.state.lock().destroy_calls
    }

    pub fn sandboxes_created(&self) -> usize {
        self.state.lock().sandboxes_created
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    fn name(&self) -> &str {
        "Fake"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            architecture: "x64".into(),
            isolation: IsolationKind::None,
            max_cpu: 1,
            max_memory_mb: 0,
        }
    }

    async fn create_sandbox(
        &self,
        ctx: &ExecutionContext,
        job: &JobSpec,
    ) -> Result<Box<dyn Sandbox>, InfrastructureError> {
        ctx.check()?;
        if let Some(error) = &self.create_error {
            return Err(error.clone());
        }

        let id = {
            let mut state = self.state.lock();
            state.sandboxes_created += 1;
            format!("fake-{}-{}", job.job_id, state.sandboxes_created)
        };
        Ok(Box::new(FakeSandbox {
            id,
            results: self.results.clone(),
            destroy_error: self.destroy_error.clone(),
            block_on: self.block_on.clone(),
            cancel_after: self.cancel_after.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct FakeSandbox {
    id: String,
    results: HashMap<String, StepResult>,
    destroy_error: Option<TeardownError>,
    block_on: Option<String>,
    cancel_after: Option<(String, CancellationToken)>,
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl Sandbox for FakeSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run_step(&self, ctx: &ExecutionContext, step: &StepSpec) -> StepResult {
        {
            let mut state = self.state.lock();
            state.executed_steps.push(step.name.clone());
            state.step_in_flight += 1;
        }

        let result = if self.block_on.as_deref() == Some(step.name.as_str()) {
            match ctx.guard(std::future::pending::<()>()).await {
                Ok(()) => StepResult::completed(0, "", ""),
                Err(e) => StepResult::infrastructure_with_output(e, "partial", ""),
            }
        } else {
            // Yield once so concurrent runs interleave.
            tokio::task::yield_now().await;
            self.results
                .get(&step.name)
                .cloned()
                .unwrap_or_else(|| StepResult::completed(0, "", ""))
        };

        self.state.lock().step_in_flight -= 1;
        if let Some((name, cancel)) = &self.cancel_after {
            if *name == step.name {
                cancel.cancel();
            }
        }
        result
    }

    async fn destroy(self: Box<Self>, _ctx: &ExecutionContext) -> Result<(), TeardownError> {
        let mut state = self.state.lock();
        state.destroy_calls += 1;
        if state.step_in_flight > 0 {
            state.destroyed_during_step = true;
        }
        match &self.destroy_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeEngine
// ---------------------------------------------------------------------------

/// What one exec session does once attached.
#[derive(Debug, Clone, Default)]
pub struct ExecScript {
    pub output: Vec<ExecOutput>,
    pub exit_code: Option<i64>,
    /// Keep the stream open after the scripted output.
    pub hang: bool,
    /// Fail the stream after the scripted output.
    pub stream_error: Option<String>,
}

impl ExecScript {
    pub fn exits(code: i64) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::default()
        }
    }

    pub fn stdout(mut self, text: &str) -> Self {
        self.output.push(ExecOutput::StdOut(Bytes::from(text.to_string())));
        self
    }

    pub fn stderr(mut self, text: &str) -> Self {
        self.output.push(ExecOutput::StdErr(Bytes::from(text.to_string())));
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct EngineState {
    /// Engine calls in order, e.g. `"pull alpine:3.19"`.
    pub calls: Vec<String>,
    pub containers: Vec<ContainerInfo>,
    pub execs: Vec<(String, ExecConfig)>,
    pub scripts: VecDeque<ExecScript>,
    sessions: HashMap<String, ExecScript>,
    next_id: usize,
}

/// Container engine that follows scripts instead of talking to a daemon.
#[derive(Default)]
pub struct FakeEngine {
    pub state: Mutex<EngineState>,
    pub fail_pull: bool,
    pub hang_pull: bool,
    /// The create lands on the daemon, then the call takes this long to return.
    pub create_delay: Option<Duration>,
    pub fail_create: bool,
    pub fail_start: bool,
    pub fail_exec_create: bool,
    /// Stop takes the whole grace period it is given.
    pub slow_stop: bool,
    pub hang_stop: bool,
    pub fail_stop: bool,
    pub fail_remove: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, script: ExecScript) -> Self {
        self.state.lock().scripts.push_back(script);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn execs(&self) -> Vec<(String, ExecConfig)> {
        self.state.lock().execs.clone()
    }

    fn record(&self, call: String) {
        self.state.lock().calls.push(call);
    }

    fn fail(&self, what: &str) -> EngineError {
        EngineError::Other(format!("{} failed", what))
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn pull_image(&self, image: &str) -> Result<(), EngineError> {
        self.record(format!("pull {}", image));
        if self.hang_pull {
            std::future::pending::<()>().await;
        }
        if self.fail_pull {
            return Err(self.fail("pull"));
        }
        Ok(())
    }

    async fn create_container(&self, info: &ContainerInfo) -> Result<String, EngineError> {
        self.record(format!("create {}", info.container_name));
        if self.fail_create {
            return Err(self.fail("create"));
        }
        let id = {
            let mut state = self.state.lock();
            state.containers.push(info.clone());
            state.next_id += 1;
            format!("c{}", state.next_id)
        };
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(id)
    }

    async fn start_container(&self, container_id: &str) -> Result<(), EngineError> {
        self.record(format!("start {}", container_id));
        if self.fail_start {
            return Err(self.fail("start"));
        }
        Ok(())
    }

    async fn create_exec(&self, container_id: &str, exec: &ExecConfig) -> Result<String, EngineError> {
        self.record(format!("exec {} {}", container_id, exec.command.join(" ")));
        if self.fail_exec_create {
            return Err(self.fail("exec create"));
        }
        let mut state = self.state.lock();
        state.next_id += 1;
        let exec_id = format!("e{}", state.next_id);
        let script = state.scripts.pop_front().unwrap_or_else(|| ExecScript::exits(0));
        state.sessions.insert(exec_id.clone(), script);
        state.execs.push((container_id.to_string(), exec.clone()));
        Ok(exec_id)
    }

    async fn attach_exec(&self, exec_id: &str) -> Result<ExecStream, EngineError> {
        self.record(format!("attach {}", exec_id));
        let script = self
            .state
            .lock()
            .sessions
            .get(exec_id)
            .cloned()
            .ok_or_else(|| self.fail("attach"))?;

        let mut items: Vec<Result<ExecOutput, EngineError>> =
            script.output.into_iter().map(Ok).collect();
        if let Some(message) = script.stream_error {
            items.push(Err(EngineError::Other(message)));
        }
        let head = futures::stream::iter(items);
        if script.hang {
            Ok(head.chain(futures::stream::pending()).boxed())
        } else {
            Ok(head.boxed())
        }
    }

    async fn inspect_exec(&self, exec_id: &str) -> Result<ExecState, EngineError> {
        self.record(format!("inspect {}", exec_id));
        let state = self.state.lock();
        let script = state.sessions.get(exec_id).ok_or_else(|| self.fail("inspect"))?;
        Ok(ExecState {
            running: false,
            exit_code: script.exit_code,
        })
    }

    async fn stop_container(&self, container_id: &str, grace: Duration) -> Result<(), EngineError> {
        self.record(format!("stop {} {}", container_id, grace.as_secs()));
        if self.hang_stop {
            std::future::pending::<()>().await;
        }
        if self.slow_stop {
            tokio::time::sleep(grace).await;
        }
        if self.fail_stop {
            return Err(self.fail("stop"));
        }
        Ok(())
    }

    async fn remove_container(&self, container_id: &str, force: bool) -> Result<(), EngineError> {
        self.record(format!("remove {} force={}", container_id, force));
        if self.fail_remove {
            return Err(self.fail("remove"));
        }
        Ok(())
    }
}
