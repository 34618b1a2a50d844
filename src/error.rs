//! Error types for junos-rpc.
//!
//! Each layer carries its own error enum ([`ConnectionError`] for the device
//! session, [`ModuleError`] for the module); this module holds the crate-level
//! [`Error`] that the binary and the ambient setup code (configuration,
//! logging, argument loading) report through.
//!
//! [`ConnectionError`]: crate::connection::ConnectionError
//! [`ModuleError`]: crate::modules::ModuleError

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for junos-rpc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for junos-rpc.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Module Errors
    // ========================================================================
    /// Module execution failed.
    #[error(transparent)]
    Module(#[from] crate::modules::ModuleError),

    /// Invalid module arguments.
    #[error("Invalid module arguments in '{path}': {message}")]
    ModuleArgs {
        /// Path to the arguments file
        path: PathBuf,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a module arguments error.
    pub fn module_args(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ModuleArgs {
            path: path.into(),
            message: message.into(),
        }
    }
}
