//! Logging setup using the tracing crate.
//!
//! Stdout belongs to the module result, so human-readable logs go to stderr.
//! When a log file is configured every event is also appended to it, without
//! ANSI colors.

use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Output format for the stderr layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Full,
    /// One JSON object per event
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "full" | "text" => Ok(LogFormat::Full),
            "json" => Ok(LogFormat::Json),
            _ => Err(Error::InvalidConfig {
                key: "log_format".to_string(),
                message: format!("'{}' is not one of: full, json", s),
            }),
        }
    }
}

/// Builder for the global subscriber.
#[derive(Debug, Clone, Default)]
pub struct LoggingBuilder {
    verbosity: u8,
    level: Option<String>,
    format: LogFormat,
    file: Option<PathBuf>,
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `-v` flags given on the command line
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Level used when no `-v` flag is given
    pub fn with_level(mut self, level: Option<String>) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Also append events to `path`
    pub fn with_file_output(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Filter directive used when `RUST_LOG` is not set
    pub fn default_directive(&self) -> String {
        match self.verbosity {
            0 => self.level.clone().unwrap_or_else(|| "warn".to_string()),
            1 => "info".to_string(),
            2 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }

    /// Build and install the global subscriber.
    pub fn init(self) -> Result<()> {
        let directive = self.default_directive();
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&directive))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        let stderr_layer = match self.format {
            LogFormat::Full => fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(self.verbosity >= 3)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed(),
        };

        let file_layer = match self.file {
            Some(ref path) => {
                let path = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned());
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(|e| {
                        Error::config(format!(
                            "Failed to open log file {}: {}",
                            path.display(),
                            e
                        ))
                    })?;
                Some(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| Error::Config(e.to_string()))
    }
}
