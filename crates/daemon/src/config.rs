// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Layered configuration: compiled-in defaults, a TOML file, then
//! `SANDBOXD_`-prefixed environment variables with `__` nesting (spec
//! §4.11), mirroring the original's pydantic-settings layering with
//! `toml` + plain `std::env` reads rather than an extra crate.

use std::path::{Path, PathBuf};

use sandbox_core::Profile;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    ParseToml { path: PathBuf, source: toml::de::Error },

    #[error("invalid value for {key:?}: {message}")]
    EnvOverride { key: &'static str, message: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Driver selection (spec §4.2a). `type = "docker"` is the default; `type =
/// "k8s"` requires `namespace`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriverConfig {
    Docker {
        #[serde(default)]
        socket: Option<String>,
    },
    K8s {
        namespace: String,
    },
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::Docker { socket: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub interval_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarmPoolConfig {
    pub interval_secs: u64,
    pub run_on_startup: bool,
}

impl Default for WarmPoolConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            run_on_startup: true,
        }
    }
}

/// Fully resolved daemon configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub driver: DriverConfig,
    pub reconciler: ReconcilerConfig,
    pub warm_pool: WarmPoolConfig,
    /// Directory for operational state (currently just created at startup;
    /// this crate's `Store` is in-memory and drivers own their own external
    /// resources, so nothing is written here yet).
    pub state_dir: PathBuf,
    pub profiles: Vec<Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            driver: DriverConfig::default(),
            reconciler: ReconcilerConfig::default(),
            warm_pool: WarmPoolConfig::default(),
            state_dir: default_state_dir().unwrap_or_else(|| PathBuf::from(".sandboxd")),
            profiles: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then `toml_path` if it exists, then
    /// `SANDBOXD_`-prefixed environment overrides.
    pub fn load(toml_path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(toml_path) {
            Ok(contents) => toml::from_str(&contents).map_err(|source| ConfigError::ParseToml {
                path: toml_path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(source) => {
                return Err(ConfigError::ReadFile {
                    path: toml_path.to_path_buf(),
                    source,
                })
            }
        };
        apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Resolves the config file path: `--config` flag, else
    /// `SANDBOXD_CONFIG_FILE`, else `./sandboxd.toml`.
    pub fn resolve_path(flag: Option<&str>) -> PathBuf {
        if let Some(path) = flag {
            return PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("SANDBOXD_CONFIG_FILE") {
            return PathBuf::from(path);
        }
        PathBuf::from("./sandboxd.toml")
    }
}

fn default_state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("SANDBOXD_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    dirs::state_dir().map(|dir| dir.join("sandboxd"))
}

fn env_var(key: &'static str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env_var(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::EnvOverride { key, message: format!("{raw:?} is not valid") }),
    }
}

fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Some(host) = env_var("SANDBOXD_SERVER__HOST") {
        config.server.host = host;
    }
    if let Some(port) = parse_env::<u16>("SANDBOXD_SERVER__PORT")? {
        config.server.port = port;
    }
    if let Some(dir) = env_var("SANDBOXD_STATE_DIR") {
        config.state_dir = PathBuf::from(dir);
    }
    if let Some(interval) = parse_env::<u64>("SANDBOXD_RECONCILER__INTERVAL_SECS")? {
        config.reconciler.interval_secs = interval;
    }
    if let Some(interval) = parse_env::<u64>("SANDBOXD_WARM_POOL__INTERVAL_SECS")? {
        config.warm_pool.interval_secs = interval;
    }
    if let Some(driver_type) = env_var("SANDBOXD_DRIVER__TYPE") {
        config.driver = match driver_type.as_str() {
            "docker" => DriverConfig::Docker { socket: env_var("SANDBOXD_DRIVER__SOCKET") },
            "k8s" => {
                let namespace = env_var("SANDBOXD_DRIVER__NAMESPACE").ok_or_else(|| ConfigError::EnvOverride {
                    key: "SANDBOXD_DRIVER__NAMESPACE",
                    message: "required when SANDBOXD_DRIVER__TYPE=k8s".to_string(),
                })?;
                DriverConfig::K8s { namespace }
            }
            other => {
                return Err(ConfigError::EnvOverride {
                    key: "SANDBOXD_DRIVER__TYPE",
                    message: format!("unknown driver type {other:?}, expected \"docker\" or \"k8s\""),
                })
            }
        };
    } else if let DriverConfig::Docker { socket } = &mut config.driver {
        if let Some(override_socket) = env_var("SANDBOXD_DRIVER__SOCKET") {
            *socket = Some(override_socket);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
