// Descriptive metadata an external scheduler uses to place jobs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::CURRENT_ARCHITECTURE;

/// How an executor isolates a job from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationKind {
    Container,
    Vm,
    None,
}

impl fmt::Display for IsolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationKind::Container => write!(f, "container"),
            IsolationKind::Vm => write!(f, "vm"),
            IsolationKind::None => write!(f, "none"),
        }
    }
}

/// What an executor offers. The engine only produces and carries this value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub architecture: String,
    pub isolation: IsolationKind,
    /// CPU count ceiling.
    pub max_cpu: usize,
    /// Memory ceiling in MiB; `0` when unknown.
    pub max_memory_mb: u64,
}

impl Capabilities {
    /// Describe the current host for the given isolation kind.
    pub fn from_host(isolation: IsolationKind) -> Self {
        let max_cpu = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let mut system = sysinfo::System::new();
        system.refresh_memory();
        let max_memory_mb = system.total_memory() / (1024 * 1024);

        Self {
            architecture: CURRENT_ARCHITECTURE.to_string(),
            isolation,
            max_cpu,
            max_memory_mb,
        }
    }
}
