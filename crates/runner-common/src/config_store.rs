// Loading and saving the runner settings file.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use runner_sdk::IOUtil;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{self, container::DEFAULT_STOP_TIMEOUT_SECS};

fn default_stop_timeout() -> u64 {
    DEFAULT_STOP_TIMEOUT_SECS
}

// ---------------------------------------------------------------------------
// RunnerSettings
// ---------------------------------------------------------------------------

/// Persisted runner configuration (`meta.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerSettings {
    /// The runner's display name.
    #[serde(default)]
    pub runner_name: String,

    /// Registration token handed to the orchestrator by the registration
    /// collaborator. The execution engine never reads it.
    #[serde(default)]
    pub token: String,

    /// Orchestrator host that supplies jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator_host: Option<String>,

    /// Seconds a job container gets to stop before it is killed.
    #[serde(default = "default_stop_timeout")]
    pub container_stop_timeout_secs: u64,

    /// Docker endpoint override; the local socket is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_host: Option<String>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            runner_name: String::new(),
            token: String::new(),
            orchestrator_host: None,
            container_stop_timeout_secs: DEFAULT_STOP_TIMEOUT_SECS,
            docker_host: None,
        }
    }
}

impl RunnerSettings {
    /// Overlay values taken from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = lookup(constants::env::ORCHESTRATOR_HOST) {
            self.orchestrator_host = Some(host);
        }
        if let Some(token) = lookup(constants::env::REGISTRATION_TOKEN) {
            self.token = token;
        }
        if let Some(docker) = lookup(constants::env::DOCKER_HOST) {
            self.docker_host = Some(docker);
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigurationStore
// ---------------------------------------------------------------------------

/// Handles loading and saving runner settings in the config directory.
pub struct ConfigurationStore {
    config_dir: PathBuf,
    settings_file_path: PathBuf,
    settings: Mutex<Option<RunnerSettings>>,
}

impl ConfigurationStore {
    /// Create a store rooted at `config_dir`.
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        let settings_file_path = config_dir.join(constants::config::META_FILE_NAME);
        Self {
            config_dir,
            settings_file_path,
            settings: Mutex::new(None),
        }
    }

    /// The config directory from `RUNNER_CONFIG_DIR`, or the default.
    pub fn default_config_dir() -> PathBuf {
        std::env::var(constants::env::CONFIG_DIR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(constants::config::DEFAULT_CONFIG_DIR))
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn settings_file_path(&self) -> &Path {
        &self.settings_file_path
    }

    /// Whether a settings file exists.
    pub fn is_configured(&self) -> bool {
        self.settings_file_path.exists()
    }

    /// Load and return runner settings. Cached after first load.
    pub fn get_settings(&self) -> Result<RunnerSettings> {
        let mut guard = self.settings.lock();
        if let Some(ref settings) = *guard {
            return Ok(settings.clone());
        }

        let settings: RunnerSettings = IOUtil::load_object(&self.settings_file_path)
            .context("Failed to load runner settings")?;

        *guard = Some(settings.clone());
        Ok(settings)
    }

    /// Settings from disk when configured, defaults otherwise; environment
    /// overrides are applied on top either way.
    pub fn load_effective_settings(&self) -> Result<RunnerSettings> {
        let mut settings = if self.is_configured() {
            self.get_settings()?
        } else {
            RunnerSettings::default()
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Save runner settings to disk.
    pub fn save_settings(&self, settings: &RunnerSettings) -> Result<()> {
        IOUtil::save_object(&self.settings_file_path, settings).with_context(|| {
            format!(
                "Failed to write settings to {:?}",
                self.settings_file_path
            )
        })?;

        *self.settings.lock() = Some(settings.clone());
        Ok(())
    }

    /// Record a registration token and orchestrator host.
    pub fn configure(&self, token: &str, orchestrator_host: Option<String>) -> Result<RunnerSettings> {
        let token = token.trim();
        if token.is_empty() {
            anyhow::bail!("registration token cannot be empty");
        }

        let mut settings = if self.is_configured() {
            self.get_settings()?
        } else {
            RunnerSettings::default()
        };
        settings.token = token.to_string();
        if let Some(host) = orchestrator_host.filter(|h| !h.trim().is_empty()) {
            settings.orchestrator_host = Some(host);
        }
        if settings.orchestrator_host.is_none() {
            anyhow::bail!("{} not set", constants::env::ORCHESTRATOR_HOST);
        }

        self.save_settings(&settings)?;
        Ok(settings)
    }
}
