//! Runtime configuration for the execution core. Everything has a sensible
//! default; deployments override via a TOML file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, CoreResult};
use crate::replay::recorder::ReplayConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    /// Fail hard on replay hash divergence instead of warning.
    pub strict: bool,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self { strict: false }
    }
}

impl ReplaySettings {
    pub fn to_replay_config(&self) -> ReplayConfig {
        ReplayConfig {
            strict: self.strict,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// TTL applied when a scheduled metric does not set its own.
    pub default_ttl_seconds: u64,
    /// How often a scheduling loop should sweep for due metrics.
    pub sweep_interval_seconds: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            default_ttl_seconds: 3600,
            sweep_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    /// Bound on the simulated execution log kept per validation.
    pub log_capacity: usize,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self { log_capacity: 1024 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub replay: ReplaySettings,
    pub scheduler: SchedulerSettings,
    pub sandbox: SandboxSettings,
}

impl CoreConfig {
    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        toml::from_str(content).map_err(|e| CoreError::Storage(format!("invalid config: {e}")))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CoreError::Storage(format!("read {}: {e}", path.as_ref().display()))
        })?;
        Self::from_toml_str(&content)
    }
}
