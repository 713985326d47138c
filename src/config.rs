//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `hub.toml`.
//!     loads configuration from file or falls back to defaults, then applies
//!     environment overrides.
//!
//! structure:
//!     - ServerConfig: bind address and port of the http listener.
//!     - StorageConfig: path of the sqlite reading log.
//!     - LoggingConfig: default log level (RUST_LOG still wins).
//!
//! lookup order:
//!     1. file named by HUB_CONFIG (must exist and parse)
//!     2. first of config/hub.toml, ../config/hub.toml that exists
//!        (a file that exists but does not parse stops startup)
//!     3. built-in defaults
//!     then HUB_BIND / HUB_PORT / HUB_DB_PATH override individual fields.
//!
//! ==============================================================================

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "HUB_CONFIG";
pub const BIND_ENV: &str = "HUB_BIND";
pub const PORT_ENV: &str = "HUB_PORT";
pub const DB_PATH_ENV: &str = "HUB_DB_PATH";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: IpAddr::from([0, 0, 0, 0]), port: 5000 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("data").join("readings.db") }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl HubConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| anyhow!("Failed to parse config: {}", e))
    }

    /// Resolve the effective configuration for this process
    ///
    /// Returns the config and where it came from, for the startup log.
    pub fn resolve() -> Result<(Self, String)> {
        let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let candidates = [
            PathBuf::from("config").join("hub.toml"),
            PathBuf::from("..").join("config").join("hub.toml"),
        ];

        Self::resolve_from(explicit, &candidates, |key| std::env::var(key).ok())
    }

    /// An explicit path must load. Otherwise the first candidate that exists
    /// is loaded, and a file that exists but fails to parse is an error
    /// rather than a silent fall back to defaults.
    pub fn resolve_from<F>(
        explicit: Option<PathBuf>,
        candidates: &[PathBuf],
        lookup: F,
    ) -> Result<(Self, String)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (mut config, source) = match explicit {
            Some(path) => (Self::load(&path)?, path.display().to_string()),
            None => match candidates.iter().find(|p| p.exists()) {
                Some(path) => (Self::load(path)?, path.display().to_string()),
                None => (Self::default(), "defaults".to_string()),
            },
        };

        config.apply_overrides(lookup)?;
        Ok((config, source))
    }

    /// Apply HUB_* overrides, `lookup` reads one variable
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup(BIND_ENV) {
            self.server.bind = bind
                .parse()
                .with_context(|| format!("{} is not an ip address: {}", BIND_ENV, bind))?;
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.server.port = port
                .parse()
                .with_context(|| format!("{} is not a port: {}", PORT_ENV, port))?;
        }
        if let Some(path) = lookup(DB_PATH_ENV) {
            self.storage.path = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.bind, self.server.port)
    }

    /// Log configuration summary
    pub fn log_summary(&self, source: &str) {
        tracing::info!(
            source,
            listen = %self.listen_addr(),
            storage = %self.storage.path.display(),
            log_level = %self.logging.level,
            "hub configuration"
        );
    }
}
