use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

use crate::h2h::H2hConfig;
use crate::lock::redis_lock::LockConfig;
use crate::pricing::PRICING_NAMESPACE;
use crate::tier::TierConfig;
use crate::tier::schedule::SCHEDULE_NAMESPACE;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub postgres_url: String,
    pub redis_url: String,
    #[serde(default)]
    pub cache: CacheConfig,
    pub h2h: H2hConfig,
    #[serde(default)]
    pub tier: TierConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub lock: LockConfig,
}

/// Cache namespaces
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    pub pricing_namespace: String,
    pub schedule_namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            pricing_namespace: PRICING_NAMESPACE.to_string(),
            schedule_namespace: SCHEDULE_NAMESPACE.to_string(),
        }
    }
}

/// Periodic job intervals
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub sweep_interval_secs: u64,
    pub warm_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            warm_interval_secs: 300,
        }
    }
}

impl AppConfig {
    /// Load `config/{env}.yaml`
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        Self::from_file(&format!("config/{}.yaml", env))
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}
