// Runner-wide enums and constant groups.

use std::fmt;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    X86,
    X64,
    Arm,
    Arm64,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86 => write!(f, "X86"),
            Architecture::X64 => write!(f, "X64"),
            Architecture::Arm => write!(f, "ARM"),
            Architecture::Arm64 => write!(f, "ARM64"),
        }
    }
}

/// The current CPU architecture, detected at compile time.
#[cfg(target_arch = "x86")]
pub const CURRENT_ARCHITECTURE: Architecture = Architecture::X86;
#[cfg(target_arch = "x86_64")]
pub const CURRENT_ARCHITECTURE: Architecture = Architecture::X64;
#[cfg(target_arch = "arm")]
pub const CURRENT_ARCHITECTURE: Architecture = Architecture::Arm;
#[cfg(target_arch = "aarch64")]
pub const CURRENT_ARCHITECTURE: Architecture = Architecture::Arm64;
#[cfg(not(any(
    target_arch = "x86",
    target_arch = "x86_64",
    target_arch = "arm",
    target_arch = "aarch64"
)))]
pub const CURRENT_ARCHITECTURE: Architecture = Architecture::X64; // default fallback

// ---------------------------------------------------------------------------
// Top-level constants
// ---------------------------------------------------------------------------

/// Exit code recorded on a step that could not be run or observed.
pub const INFRASTRUCTURE_EXIT_CODE: i64 = -1;

/// Working directory used for a step that does not set one.
pub const DEFAULT_STEP_WORKDIR: &str = container::WORKSPACE_MOUNT;

// ---------------------------------------------------------------------------
// Container backend
// ---------------------------------------------------------------------------

pub mod container {
    /// Where the job workspace is bind-mounted inside the job container.
    pub const WORKSPACE_MOUNT: &str = "/workspace";

    /// Prefix of the job container name; the job ID follows it.
    pub const NAME_PREFIX: &str = "Job-";

    /// Keeps the job container alive between exec sessions.
    pub const KEEP_ALIVE_COMMAND: &[&str] = &["sleep", "infinity"];

    /// Grace period given to `stop` before the engine kills the container.
    pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

    /// Name reported by the container executor.
    pub const EXECUTOR_NAME: &str = "Docker";
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub mod config {
    /// Default directory holding the runner settings file.
    pub const DEFAULT_CONFIG_DIR: &str = "/var/lib/cheeky-ci-runner";

    /// Settings file name inside the config directory.
    pub const META_FILE_NAME: &str = "meta.json";
}

// ---------------------------------------------------------------------------
// Environment variables
// ---------------------------------------------------------------------------

pub mod env {
    pub const ORCHESTRATOR_HOST: &str = "ORCHESTRATOR_HOST";
    pub const REGISTRATION_TOKEN: &str = "REGISTRATION_TOKEN";
    pub const CONFIG_DIR: &str = "RUNNER_CONFIG_DIR";
    pub const DOCKER_HOST: &str = "DOCKER_HOST";
}

// ---------------------------------------------------------------------------
// Process return codes
// ---------------------------------------------------------------------------

pub mod return_code {
    pub const SUCCESS: i32 = 0;
    pub const TERMINATED_ERROR: i32 = 1;
    pub const JOB_FAILED: i32 = 2;
}
