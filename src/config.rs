//! Configuration for junos-rpc
//!
//! Handles loading and merging module defaults from multiple sources:
//! - System configuration (/etc/junos-rpc/config.toml)
//! - User configuration (~/.junos-rpc.toml)
//! - Project configuration (./junos-rpc.toml)
//! - Environment variables (`JUNOS_RPC_*`)
//!
//! Values found here only fill in options the module invocation leaves
//! unset.

use crate::error::{Error, Result};
use crate::modules::ModuleParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default module options
    pub defaults: Defaults,

    /// SSH settings
    pub ssh: SshConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Default values for module options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Login user
    pub user: Option<String>,

    /// NETCONF port
    pub port: Option<u16>,

    /// RPC timeout in seconds
    pub timeout: Option<u32>,

    /// Reply format (text, xml, json)
    pub format: Option<String>,
}

/// SSH settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Private key used for key-based login
    pub private_key_file: Option<PathBuf>,
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// File module logs are appended to
    pub log_path: Option<PathBuf>,

    /// Log level used when no `-v` flag or `RUST_LOG` is given
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Get the list of configuration file paths to check, lowest priority
    /// first
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        if let Some(path) = explicit_path {
            return vec![path.clone()];
        }

        if let Ok(env_config) = std::env::var("JUNOS_RPC_CONFIG") {
            return vec![PathBuf::from(env_config)];
        }

        let mut paths = vec![PathBuf::from("/etc/junos-rpc/config.toml")];

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".junos-rpc.toml"));
        }

        paths.push(PathBuf::from("junos-rpc.toml"));
        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            "toml" => toml::from_str(&content)?,
            _ => toml::from_str(&content)
                .or_else(|_| serde_yaml::from_str(&content))
                .map_err(|e| {
                    Error::config(format!(
                        "Failed to parse config file {}: {}",
                        path.display(),
                        e
                    ))
                })?,
        };

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one; values set in `other` win
    fn merge(&self, other: Config) -> Config {
        Config {
            defaults: Defaults {
                user: other.defaults.user.or_else(|| self.defaults.user.clone()),
                port: other.defaults.port.or(self.defaults.port),
                timeout: other.defaults.timeout.or(self.defaults.timeout),
                format: other
                    .defaults
                    .format
                    .or_else(|| self.defaults.format.clone()),
            },
            ssh: SshConfig {
                private_key_file: other
                    .ssh
                    .private_key_file
                    .or_else(|| self.ssh.private_key_file.clone()),
            },
            logging: LoggingConfig {
                log_path: other
                    .logging
                    .log_path
                    .or_else(|| self.logging.log_path.clone()),
                log_level: other
                    .logging
                    .log_level
                    .or_else(|| self.logging.log_level.clone()),
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        // JUNOS_RPC_USER
        if let Ok(user) = std::env::var("JUNOS_RPC_USER") {
            self.defaults.user = Some(user);
        }

        // JUNOS_RPC_PORT
        if let Ok(port) = std::env::var("JUNOS_RPC_PORT") {
            let port = port.parse().map_err(|_| Error::InvalidConfig {
                key: "JUNOS_RPC_PORT".to_string(),
                message: format!("'{}' is not a valid port", port),
            })?;
            self.defaults.port = Some(port);
        }

        // JUNOS_RPC_TIMEOUT
        if let Ok(timeout) = std::env::var("JUNOS_RPC_TIMEOUT") {
            let timeout = timeout.parse().map_err(|_| Error::InvalidConfig {
                key: "JUNOS_RPC_TIMEOUT".to_string(),
                message: format!("'{}' is not a number of seconds", timeout),
            })?;
            self.defaults.timeout = Some(timeout);
        }

        // JUNOS_RPC_FORMAT
        if let Ok(format) = std::env::var("JUNOS_RPC_FORMAT") {
            self.defaults.format = Some(format);
        }

        // JUNOS_RPC_PRIVATE_KEY_FILE
        if let Ok(file) = std::env::var("JUNOS_RPC_PRIVATE_KEY_FILE") {
            self.ssh.private_key_file = Some(PathBuf::from(file));
        }

        // JUNOS_RPC_LOGFILE
        if let Ok(path) = std::env::var("JUNOS_RPC_LOGFILE") {
            self.logging.log_path = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// Fill module options the invocation left unset
    pub fn apply_defaults(&self, params: &mut ModuleParams) {
        let mut set_default = |key: &str, value: Option<serde_json::Value>| {
            if let Some(value) = value {
                let unset = params.get(key).map_or(true, serde_json::Value::is_null);
                if unset {
                    params.insert(key.to_string(), value);
                }
            }
        };

        set_default("user", self.defaults.user.clone().map(Into::into));
        set_default("port", self.defaults.port.map(Into::into));
        set_default("timeout", self.defaults.timeout.map(Into::into));
        set_default("format", self.defaults.format.clone().map(Into::into));
        set_default(
            "ssh_private_key_file",
            self.ssh
                .private_key_file
                .as_ref()
                .map(|p| p.display().to_string().into()),
        );
        set_default(
            "logfile",
            self.logging
                .log_path
                .as_ref()
                .map(|p| p.display().to_string().into()),
        );
    }

    /// Load from a specific file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }
}
