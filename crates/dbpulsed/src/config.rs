//! dbpulse.toml configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("database.dsn is empty; set it in the config, with --dsn or DBPULSE_DSN")]
    EmptyDsn,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field}: invalid duration {value:?}")]
    InvalidDuration { field: &'static str, value: String },

    #[error("{field}: {value:?} exceeds the maximum of {max:?}")]
    DurationTooLong {
        field: &'static str,
        value: String,
        max: Duration,
    },

    #[error("server.telemetry_path {0:?} must start with '/' and must not be '/'")]
    InvalidTelemetryPath(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scrape: ScrapeConfig,
    pub logging: LoggingConfig,
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub telemetry_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 9104)),
            telemetry_path: "/metrics".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub dsn: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            max_connections: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrapeConfig {
    /// Upper bound on one scrape, e.g. "500ms", "10s", "1m".
    pub timeout: String,
    /// Collectors to run; empty runs all of them.
    pub collectors: Vec<String>,
    pub channel_capacity: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout: "10s".to_string(),
            collectors: Vec::new(),
            channel_capacity: 256,
        }
    }
}

/// Longest accepted scrape timeout.
pub const MAX_SCRAPE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

impl ScrapeConfig {
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        let timeout = parse_duration(&self.timeout)
            .filter(|d| !d.is_zero())
            .ok_or_else(|| ConfigError::InvalidDuration {
                field: "scrape.timeout",
                value: self.timeout.clone(),
            })?;
        if timeout > MAX_SCRAPE_TIMEOUT {
            return Err(ConfigError::DurationTooLong {
                field: "scrape.timeout",
                value: self.timeout.clone(),
                max: MAX_SCRAPE_TIMEOUT,
            });
        }
        Ok(timeout)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaintenanceConfig {
    /// Reset statement summaries after each successful latency scrape.
    pub truncate_statement_summary: bool,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.dsn.trim().is_empty() {
            return Err(ConfigError::EmptyDsn);
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Zero("database.max_connections"));
        }
        if self.scrape.channel_capacity == 0 {
            return Err(ConfigError::Zero("scrape.channel_capacity"));
        }
        self.scrape.timeout()?;

        let path = &self.server.telemetry_path;
        if !path.starts_with('/') || path == "/" {
            return Err(ConfigError::InvalidTelemetryPath(path.clone()));
        }
        Ok(())
    }
}

/// Parse "500ms", "10s", "2m" or a bare number of seconds.
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
