//! Configuration management for the control service
//!
//! YAML file based, with serde-level defaults so an empty or missing file
//! yields a runnable configuration. The mode registry itself lives in a
//! separate TOML store (see [`crate::modes`]); this module only points at
//! it.

use std::path::{Path, PathBuf};

use gea_bus::BusClientConfig;
use serde::{Deserialize, Serialize};

use crate::error::{HeaterSrvError, Result};

/// Default configuration file consulted by [`Config::load`]
pub const DEFAULT_CONFIG_FILE: &str = "config/heatersrv.yaml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub bus: BusClientConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub modes: ModesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Base attempt interval in milliseconds; doubles on every failure
    #[serde(default = "default_base_interval_ms")]
    pub base_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModesConfig {
    /// Path of the TOML mode store
    #[serde(default = "default_modes_file")]
    pub file: PathBuf,
}

fn default_service_name() -> String {
    "heatersrv".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8888
}

fn default_base_interval_ms() -> u64 {
    50
}

fn default_modes_file() -> PathBuf {
    PathBuf::from("modes.toml")
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: default_base_interval_ms(),
        }
    }
}

impl Default for ModesConfig {
    fn default() -> Self {
        Self {
            file: default_modes_file(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HeaterSrvError::config(format!("reading {}: {e}", path.display()))
        })?;
        let config: Config = serde_yaml::from_str(&raw)?;
        Ok(config)
    }

    /// Load from the default location, falling back to built-in defaults
    /// when no file exists.
    pub fn load() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.port == 0 {
            return Err(HeaterSrvError::config("api.port must be non-zero"));
        }
        if self.queue.base_interval_ms == 0 {
            return Err(HeaterSrvError::config(
                "queue.base_interval_ms must be non-zero",
            ));
        }
        if self.bus.gateway_url.is_empty() {
            return Err(HeaterSrvError::config("bus.gateway_url must be set"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.api.port, 8888);
        assert_eq!(config.queue.base_interval_ms, 50);
        assert_eq!(config.bus.address, 0xbb);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: Config =
            serde_yaml::from_str("api:\n  port: 9000\nmodes:\n  file: /etc/heatersrv/modes.toml\n")
                .unwrap();
        config.validate().unwrap();
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(
            config.modes.file,
            PathBuf::from("/etc/heatersrv/modes.toml")
        );
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config: Config = serde_yaml::from_str("queue:\n  base_interval_ms: 0\n").unwrap();
        assert!(config.validate().is_err());
    }
}
