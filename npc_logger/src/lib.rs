//! # Logger
//!
//! Structured logging setup for npc hosts.
//!
//! ## Philosophy
//!
//! Logging is explicit and structured, not text-based or printf-style.
//! Library crates only emit `tracing` events with fields such as
//! `endpoint` and `request_id`; whoever owns the process decides where they
//! go by calling [`init`] once.
//!
//! `RUST_LOG`, when set and valid, overrides the configured level.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Log level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    /// Debug information
    Debug,
    /// Informational messages
    #[default]
    Info,
    /// Warnings
    Warn,
    /// Errors
    Error,
}

impl LogLevel {
    /// The level as an `EnvFilter` directive
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_directive())
    }
}

impl FromStr for LogLevel {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(LoggerError::UnknownLevel(s.to_string())),
        }
    }
}

/// Where and how much to log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Full `EnvFilter` directive string; takes precedence over `level`
    pub filter: Option<String>,
    pub ansi: bool,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            filter: None,
            ansi: true,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// The configured directive string
    pub fn directives(&self) -> String {
        self.filter
            .clone()
            .unwrap_or_else(|| self.level.as_directive().to_string())
    }

    /// Checks that the configured directives parse
    pub fn validate(&self) -> Result<(), LoggerError> {
        self.configured_filter().map(|_| ())
    }

    fn configured_filter(&self) -> Result<EnvFilter, LoggerError> {
        let directives = self.directives();
        EnvFilter::try_new(&directives).map_err(|err| LoggerError::InvalidFilter {
            filter: directives,
            message: err.to_string(),
        })
    }

    /// `RUST_LOG` if set and valid, the configured directives otherwise
    pub fn env_filter(&self) -> Result<EnvFilter, LoggerError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => self.configured_filter(),
        }
    }
}

/// Errors related to logging setup
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log level `{0}`")]
    UnknownLevel(String),

    #[error("invalid log filter `{filter}`: {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("logging already initialized with a different configuration")]
    AlreadyInitialized,

    #[error("failed to install global subscriber: {0}")]
    Install(String),
}

/// Config of the subscriber installed by [`init`]
///
/// Held locked for the whole of `init`, so concurrent callers see either
/// nothing installed or the winner's config.
static INSTALLED: Mutex<Option<LoggingConfig>> = Mutex::new(None);

/// Installs the global `fmt` subscriber
///
/// Calling again with an equal config is a no-op; a different config is
/// rejected rather than silently ignored. Safe to call from several
/// threads at once.
pub fn init(config: &LoggingConfig) -> Result<(), LoggerError> {
    let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(current) = installed.as_ref() {
        return if current == config {
            Ok(())
        } else {
            Err(LoggerError::AlreadyInitialized)
        };
    }

    let filter = config.env_filter()?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(config.with_target)
        .try_init()
        .map_err(|err| LoggerError::Install(err.to_string()))?;

    *installed = Some(config.clone());
    drop(installed);
    tracing::debug!(directives = %config.directives(), "logging initialized");
    Ok(())
}

/// Routes events to the test harness's captured output
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_for_tests() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
