use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cloud::{CloudKind, Credentials};
use crate::error::{CloudError, Result};

/// Client configuration, read from `config.toml` and the environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub api_key: Option<String>,
    pub api_secretkey: Option<String>,
    pub server_url: Option<String>,
    /// `network`, `simulated` or `mp`; empty for no cloud
    pub cloud_type: Option<String>,
    /// Shorthand for `cloud_type = "simulated"`
    pub use_simulator: bool,
    /// Worker processes for the mp cloud (defaults to the CPU count)
    pub mp_workers: Option<usize>,
    /// How often the network cloud polls job status
    pub poll_interval_ms: Option<u64>,
}

impl CloudConfig {
    /// Loads `path`, or returns the defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .map_err(|e| CloudError::InvalidConfiguration(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_string(&data)
            .map_err(|e| CloudError::InvalidConfiguration(format!("{}: {}", path.display(), e)))
    }

    pub fn from_string(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Defaults, then the config file, then `SCICLOUD_*` variables.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::load(&config_path())?;

        if let Some(v) = env_value("SCICLOUD_API_KEY") {
            cfg.api_key = Some(v);
        }
        if let Some(v) = env_value("SCICLOUD_API_SECRETKEY") {
            cfg.api_secretkey = Some(v);
        }
        if let Some(v) = env_value("SCICLOUD_SERVER_URL") {
            cfg.server_url = Some(v);
        }
        if let Some(v) = env_value("SCICLOUD_CLOUD_TYPE") {
            cfg.cloud_type = Some(v);
        }
        if let Some(v) = env_value("SCICLOUD_USE_SIMULATOR") {
            cfg.use_simulator = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = env_value("SCICLOUD_MP_WORKERS") {
            let workers = v.parse().map_err(|_| {
                CloudError::InvalidConfiguration(format!("SCICLOUD_MP_WORKERS must be a number, not '{}'", v))
            })?;
            cfg.mp_workers = Some(workers);
        }
        Ok(cfg)
    }

    /// The cloud to bind, `None` for an empty `cloud_type`.
    /// The simulator switch wins over `cloud_type`.
    pub fn cloud_kind(&self) -> Result<Option<CloudKind>> {
        if self.use_simulator {
            return Ok(Some(CloudKind::Simulated));
        }
        match self.cloud_type.as_deref() {
            Some(kind) => CloudKind::parse_optional(kind),
            None => Ok(Some(CloudKind::Network)),
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.api_key.clone(),
            self.api_secretkey.clone(),
            self.server_url.clone(),
        )
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(Duration::from_millis)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// `$SCICLOUD_CONFIG`, else `$HOME/.scicloud/config.toml`.
pub fn config_path() -> PathBuf {
    if let Some(path) = env_value("SCICLOUD_CONFIG") {
        return PathBuf::from(path);
    }
    let home = env_value("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    home.join(".scicloud").join("config.toml")
}
