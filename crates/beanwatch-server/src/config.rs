//! Beanwatch configuration
//!
//! TOML-based configuration with defaults for every section. An empty file is
//! a valid configuration: one vhost derived from the server name and bind
//! port, a store under `logs/`, console logging at `info`.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//! server_name = "localhost"
//! handler_path = "/bmx"
//!
//! [store]
//! path = "logs/vhost.db"
//! lock_path = "logs/vhost.db.lock"
//!
//! [log]
//! level = "info"
//! format = "console"
//!
//! [[vhost]]
//! hostname = "example.com"
//! port = 80
//! aliases = ["www.example.com"]
//! listen = ["0.0.0.0:80"]
//! ```

use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use beanwatch_metrics::VhostSpec;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but makes no sense
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration. All sections are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
    #[serde(rename = "vhost")]
    pub vhosts: Vec<VhostConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address
    pub bind: SocketAddr,
    /// Canonical name of the main server
    pub server_name: String,
    /// Path answering bean queries
    pub handler_path: String,
    /// Whether the status bean carries traffic totals and rates
    pub extended_status: bool,
    /// Base directory for relative store paths
    pub server_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            server_name: "localhost".to_string(),
            handler_path: "/bmx".to_string(),
            extended_status: false,
            server_root: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub lock_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logs/vhost.db"),
            lock_path: PathBuf::from("logs/vhost.db.lock"),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing level filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Console,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct VhostConfig {
    pub hostname: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub listen: Vec<String>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks for an empty hostname, a relative handler path and duplicate
    /// vhost identities.
    pub fn validate(&self) -> Result<()> {
        if !self.server.handler_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "server.handler_path '{}' must start with '/'",
                self.server.handler_path
            )));
        }
        if self.server.server_name.is_empty() {
            return Err(ConfigError::Invalid("server.server_name must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for vhost in &self.vhosts {
            if vhost.hostname.is_empty() {
                return Err(ConfigError::Invalid("vhost hostname must not be empty".into()));
            }
            if !seen.insert((vhost.hostname.as_str(), vhost.port)) {
                return Err(ConfigError::Invalid(format!(
                    "vhost {}:{} is configured more than once",
                    vhost.hostname, vhost.port
                )));
            }
        }
        Ok(())
    }

    /// Store file, resolved against `server.server_root` when relative.
    pub fn store_path(&self) -> PathBuf {
        self.server.server_root.join(&self.store.path)
    }

    /// Lock file, resolved against `server.server_root` when relative.
    pub fn lock_path(&self) -> PathBuf {
        self.server.server_root.join(&self.store.lock_path)
    }

    /// Entities to count, in configuration order. Without explicit vhosts
    /// the main server itself is the only one.
    pub fn vhost_specs(&self) -> Vec<VhostSpec> {
        if self.vhosts.is_empty() {
            let bind = self.server.bind;
            return vec![VhostSpec::new(&self.server.server_name, bind.port()).with_listen(bind.to_string())];
        }

        self.vhosts
            .iter()
            .map(|v| VhostSpec {
                hostname: v.hostname.clone(),
                port: v.port,
                aliases: v.aliases.clone(),
                listen: v.listen.clone(),
            })
            .collect()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
