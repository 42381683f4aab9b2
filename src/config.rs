use anyhow::{Context, Result};
use converge::{ApplyOptions, FlavorCatalog, ProviderKind, ProviderSettings, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

/// File name of the local provider state under the state directory
const LOCAL_STATE_FILE: &str = "cloud.json";

// ============================================================================
// hostfleet.toml
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider whose driver the registry builds
    pub provider: ProviderKind,
    /// State file for the local provider (`~` and `$VARS` expanded)
    pub state_path: Option<String>,
    /// Worker threads for host-group tasks
    pub jobs: usize,
    /// Seconds to wait after each volume modification
    pub volume_settle_secs: u64,
    pub retry: RetryConfig,
    pub flavors: FlavorCatalog,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            state_path: None,
            jobs: 8,
            volume_settle_secs: 5,
            retry: RetryConfig::default(),
            flavors: FlavorCatalog::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub interval_secs: u64,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval_secs: 3,
            backoff_factor: 1.0,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_attempts, Duration::from_secs(self.interval_secs))
            .with_backoff(self.backoff_factor)
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Result<PathBuf> {
        Ok(paths::config_dir()?.join("config.toml"))
    }

    /// Load config from `path`, or from the default location
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// file that was asked for explicitly is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path()?, false),
        };

        if !path.exists() {
            if explicit {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.jobs == 0 {
            anyhow::bail!("jobs must be at least 1");
        }
        Ok(config)
    }

    /// Local provider state file, configured or under the state directory
    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.state_path {
            Some(path) => Ok(paths::expand(path)),
            None => Ok(paths::state_dir()?.join(LOCAL_STATE_FILE)),
        }
    }

    pub fn provider_settings(&self) -> Result<ProviderSettings> {
        Ok(ProviderSettings {
            state_path: Some(self.state_path()?),
        })
    }

    /// Engine options, with `jobs` overridden when given
    pub fn apply_options(&self, jobs: Option<usize>) -> ApplyOptions {
        ApplyOptions {
            jobs: jobs.unwrap_or(self.jobs).max(1),
            retry: self.retry.policy(),
            volume_settle: Duration::from_secs(self.volume_settle_secs),
        }
    }
}
