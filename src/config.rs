//! Configuration management for passgate.
//!
//! Configuration is read from environment variables once at startup:
//! - `PASSWORD_STORE_DIR` - Required. The store root. A leading `~` expands to `$HOME`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `LOG_LEVEL` - Optional. `error`, `warn`, `info`, `debug` or `trace`. Defaults to `info`.
//! - `FS_TIMEOUT_SECS` - Optional. Bound on each filesystem operation. Defaults to `10`.
//! - `GPG_BINARY` - Optional. Program used to encrypt listings. Defaults to `gpg`.
//! - `GPG_TIMEOUT_SECS` - Optional. Bound on each `gpg` run. Defaults to `30`.
//! - `MAX_BODY_BYTES` - Optional. Largest request body accepted. Defaults to `65536`.
//! - `LOG_DIR` - Optional. Directory for `server.log` and `error.log`. A leading `~`
//!   expands to `$HOME`. Console only when unset.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::pgp::GpgConfig;
use crate::util::{env_var_parse, expand_tilde};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Verbosity of the `passgate` log target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub fn filter_directives(self) -> String {
        format!("passgate={0},tower_http={0}", self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!(
                "unknown log level {:?}, expected error, warn, info, debug or trace",
                other
            )),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store root as configured (not yet canonicalized)
    pub store_dir: PathBuf,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    pub log_level: LogLevel,

    /// Bound on trust anchor scans, walks and secret reads
    pub fs_timeout: Duration,

    /// External OpenPGP program settings
    pub gpg: GpgConfig,

    /// Largest request body the auth middleware will buffer
    pub max_body_bytes: usize,

    /// Where log files go, if anywhere
    pub log_dir: Option<PathBuf>,
}

/// Blank means unset.
fn log_dir_from(value: Option<String>) -> Option<PathBuf> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| expand_tilde(v.trim()))
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `PASSWORD_STORE_DIR` is not set
    /// and `ConfigError::InvalidValue` for any value that does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let store_dir = std::env::var("PASSWORD_STORE_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| expand_tilde(v.trim()))
            .ok_or_else(|| ConfigError::MissingEnvVar("PASSWORD_STORE_DIR".to_string()))?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_var_parse("PORT", 3000u16)?;
        let log_level = env_var_parse("LOG_LEVEL", LogLevel::Info)?;
        let fs_timeout = Duration::from_secs(env_var_parse("FS_TIMEOUT_SECS", 10u64)?);
        let gpg = GpgConfig {
            binary: std::env::var("GPG_BINARY")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("gpg")),
            timeout: Duration::from_secs(env_var_parse("GPG_TIMEOUT_SECS", 30u64)?),
        };
        let max_body_bytes = env_var_parse("MAX_BODY_BYTES", 64 * 1024usize)?;
        let log_dir = log_dir_from(std::env::var("LOG_DIR").ok());

        Ok(Self {
            store_dir,
            host,
            port,
            log_level,
            fs_timeout,
            gpg,
            max_body_bytes,
            log_dir,
        })
    }

    /// Create a config with default values (useful for testing).
    pub fn new(store_dir: PathBuf) -> Self {
        Self {
            store_dir,
            host: "127.0.0.1".to_string(),
            port: 3000,
            log_level: LogLevel::Info,
            fs_timeout: Duration::from_secs(10),
            gpg: GpgConfig::default(),
            max_body_bytes: 64 * 1024,
            log_dir: None,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
