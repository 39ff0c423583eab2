//! Precedence resolution for Tilt configuration.
//!
//! ## Data directory (highest to lowest)
//!
//! 1. `--data-dir` CLI flag
//! 2. `TILT_DATA_DIR` environment variable
//! 3. Platform data dir (`~/.local/share/tilt`)
//!
//! ## Everything else (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`TILT_FIXTURE`, `TILT_PORT`)
//! 3. Data-dir config.kdl (`<data_dir>/config.kdl`)
//! 4. System config.kdl (`~/.config/tilt/config.kdl`, or `TILT_CONFIG`)
//! 5. Built-in defaults

use crate::config::TiltConfig;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "TILT_DATA_DIR";

/// Environment variable overriding the fixture path.
pub const FIXTURE_ENV: &str = "TILT_FIXTURE";

/// Environment variable overriding the server port.
pub const PORT_ENV: &str = "TILT_PORT";

/// Environment variable pointing at an alternate system config.kdl.
pub const SYSTEM_CONFIG_ENV: &str = "TILT_CONFIG";

/// Name of the config file in both locations.
pub const CONFIG_FILE: &str = "config.kdl";

pub const DEFAULT_FIXTURE_PATH: &str = "fixtures/demo_tests.json";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 3040;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from environment variable
    EnvVar(String),
    /// Value from `<data_dir>/config.kdl`
    DataDir,
    /// Value from the system config.kdl
    System,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::DataDir => write!(f, "data-dir"),
            ValueSource::System => write!(f, "system"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub data_dir: Resolved<PathBuf>,
    pub fixture_path: Resolved<PathBuf>,
    pub request_timeout_ms: Resolved<u64>,
    pub server_host: Resolved<String>,
    pub server_port: Resolved<u16>,
    pub log_level: Resolved<String>,
    pub action_log: Resolved<bool>,
}

impl ResolvedConfig {
    /// Defaults for the given data directory.
    fn defaults(data_dir: Resolved<PathBuf>) -> Self {
        Self {
            data_dir,
            fixture_path: Resolved::new(PathBuf::from(DEFAULT_FIXTURE_PATH), ValueSource::Default),
            request_timeout_ms: Resolved::new(DEFAULT_REQUEST_TIMEOUT_MS, ValueSource::Default),
            server_host: Resolved::new(DEFAULT_SERVER_HOST.to_string(), ValueSource::Default),
            server_port: Resolved::new(DEFAULT_SERVER_PORT, ValueSource::Default),
            log_level: Resolved::new(DEFAULT_LOG_LEVEL.to_string(), ValueSource::Default),
            action_log: Resolved::new(true, ValueSource::Default),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir.value
    }

    pub fn fixture_path(&self) -> &Path {
        &self.fixture_path.value
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.value)
    }

    /// Host and port as a bind address string.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host.value, self.server_port.value)
    }

    pub fn log_level(&self) -> &str {
        &self.log_level.value
    }

    pub fn action_log_enabled(&self) -> bool {
        self.action_log.value
    }

    /// Apply one config file layer on top of what has been resolved so far.
    fn apply_file(&mut self, config: &TiltConfig, source: ValueSource) {
        if let Some(ref path) = config.fixture_path {
            self.fixture_path = Resolved::new(path.clone(), source.clone());
        }
        if let Some(ms) = config.request_timeout_ms {
            self.request_timeout_ms = Resolved::new(ms, source.clone());
        }
        if let Some(ref host) = config.server_host {
            self.server_host = Resolved::new(host.clone(), source.clone());
        }
        if let Some(port) = config.server_port {
            self.server_port = Resolved::new(port, source.clone());
        }
        if let Some(ref level) = config.log_level {
            self.log_level = Resolved::new(level.clone(), source.clone());
        }
        if let Some(enabled) = config.action_log {
            self.action_log = Resolved::new(enabled, source);
        }
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub fixture_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_fixture_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.fixture_path = Some(path.into());
        self
    }

    pub fn with_server_port(mut self, port: u16) -> Self {
        self.server_port = Some(port);
        self
    }
}

/// Default data directory when neither flag nor env var names one.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("tilt"))
        .unwrap_or_else(|| PathBuf::from(".tilt"))
}

/// Path of the system-level config.kdl, if one can be determined.
pub fn system_config_path(env: &dyn Fn(&str) -> Option<String>) -> Option<PathBuf> {
    env(SYSTEM_CONFIG_ENV)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::config_dir().map(|d| d.join("tilt").join(CONFIG_FILE)))
}

/// Resolve configuration from the process environment.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    resolve_with_env(overrides, &|name| std::env::var(name).ok())
}

/// Resolve configuration with an injectable environment lookup.
pub fn resolve_with_env(
    overrides: &ConfigOverrides,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let data_dir = if let Some(ref dir) = overrides.data_dir {
        Resolved::new(dir.clone(), ValueSource::CliFlag)
    } else if let Some(dir) = env(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        Resolved::new(
            PathBuf::from(dir),
            ValueSource::EnvVar(DATA_DIR_ENV.to_string()),
        )
    } else {
        Resolved::new(default_data_dir(), ValueSource::Default)
    };

    let mut result = ResolvedConfig::defaults(data_dir);

    // File layers, lowest precedence first
    if let Some(path) = system_config_path(env) {
        result.apply_file(&TiltConfig::load(&path)?, ValueSource::System);
    }
    let data_dir_config = TiltConfig::load(&result.data_dir().join(CONFIG_FILE))?;
    result.apply_file(&data_dir_config, ValueSource::DataDir);

    // Environment
    if let Some(path) = env(FIXTURE_ENV).filter(|p| !p.is_empty()) {
        result.fixture_path = Resolved::new(
            PathBuf::from(path),
            ValueSource::EnvVar(FIXTURE_ENV.to_string()),
        );
    }
    if let Some(port) = env(PORT_ENV).filter(|p| !p.is_empty()) {
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} must be a port number, got {}", PORT_ENV, port)))?;
        result.server_port = Resolved::new(port, ValueSource::EnvVar(PORT_ENV.to_string()));
    }

    // CLI flags
    if let Some(ref path) = overrides.fixture_path {
        result.fixture_path = Resolved::new(path.clone(), ValueSource::CliFlag);
    }
    if let Some(ref host) = overrides.server_host {
        result.server_host = Resolved::new(host.clone(), ValueSource::CliFlag);
    }
    if let Some(port) = overrides.server_port {
        result.server_port = Resolved::new(port, ValueSource::CliFlag);
    }

    Ok(result)
}
