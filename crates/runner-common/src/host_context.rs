// HostContext: process-wide state shared by the runner binary's services.
// Owns the configuration store, hands out trace writers, and coordinates
// the two stop signals: graceful shutdown and forced job cancellation.

use parking_lot::Mutex;
use runner_sdk::{TraceWriter, TracingTraceWriter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config_store::ConfigurationStore;

/// Why the runner is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    UserCancelled,
    OperatingSystemShutdown,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::UserCancelled => write!(f, "UserCancelled"),
            ShutdownReason::OperatingSystemShutdown => write!(f, "OperatingSystemShutdown"),
        }
    }
}

/// The central application context.
pub struct HostContext {
    config_store: ConfigurationStore,

    /// Stops the worker from accepting new jobs. In-flight steps keep running.
    runner_shutdown_token: CancellationToken,

    /// Cancels the in-flight job; its sandbox is still torn down.
    job_cancel_token: CancellationToken,

    runner_shutdown_reason: Mutex<Option<ShutdownReason>>,
}

impl HostContext {
    /// Create a context whose settings live in `config_dir`.
    pub fn new(config_dir: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            config_store: ConfigurationStore::new(config_dir),
            runner_shutdown_token: CancellationToken::new(),
            job_cancel_token: CancellationToken::new(),
            runner_shutdown_reason: Mutex::new(None),
        })
    }

    pub fn config_store(&self) -> &ConfigurationStore {
        &self.config_store
    }

    /// Get a trace writer for the given component name.
    pub fn get_trace(&self, name: &str) -> Arc<dyn TraceWriter> {
        Arc::new(TracingTraceWriter::new(name))
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Token triggered when the runner stops accepting work.
    pub fn runner_shutdown_token(&self) -> CancellationToken {
        self.runner_shutdown_token.clone()
    }

    /// Token triggered when the in-flight job must be cancelled.
    pub fn job_cancel_token(&self) -> CancellationToken {
        self.job_cancel_token.clone()
    }

    /// The reason the runner is shutting down, if shutdown has been initiated.
    pub fn runner_shutdown_reason(&self) -> Option<ShutdownReason> {
        *self.runner_shutdown_reason.lock()
    }

    /// Stop accepting new jobs.
    pub fn shutdown_runner(&self, reason: ShutdownReason) {
        self.get_trace("HostContext")
            .info(&format!("Runner will be shutdown for {}", reason));
        *self.runner_shutdown_reason.lock() = Some(reason);
        self.runner_shutdown_token.cancel();
    }

    /// Cancel the running job. Implies shutdown.
    pub fn cancel_jobs(&self, reason: ShutdownReason) {
        if !self.runner_shutdown_token.is_cancelled() {
            self.shutdown_runner(reason);
        }
        self.get_trace("HostContext")
            .warning("Cancelling in-flight job");
        self.job_cancel_token.cancel();
    }
}
