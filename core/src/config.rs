//! Configuration management

use crate::{Error, NumericTable, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where and how to connect
    pub connection: ConnectionConfig,
    /// Outbound rate limiting
    pub throttle: ThrottleConfig,
    /// Event dispatch behaviour
    pub dispatch: DispatchConfig,
    /// Extra numeric names, merged over the standard table
    pub numerics: BTreeMap<String, String>,
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Server hostname or address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Whether to wrap the connection in TLS
    pub tls: bool,
    /// Local address to bind before connecting
    pub source_address: Option<IpAddr>,
    /// Connect/read/write timeout in seconds; 0 means wait forever
    pub timeout_seconds: u64,
}

/// Token bucket settings for the send loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Seconds it takes to replenish one token; 0 disables throttling
    pub delay_seconds: f64,
    /// Maximum number of tokens
    pub burst: u32,
}

/// Dispatch settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Wait for all handlers of a message before dispatching the next one
    pub strict_ordering: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6667,
            tls: false,
            source_address: None,
            timeout_seconds: 300,
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            delay_seconds: 2.0,
            burst: 5,
        }
    }
}

impl ConnectionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Config {
    /// Create a configuration for `host:port` with default settings
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let mut config = Self::default();
        config.connection.host = host.into();
        config.connection.port = port;
        config
    }

    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.connection.host.trim().is_empty() {
            return Err(Error::Config("Host cannot be empty".to_string()));
        }

        if self.connection.port == 0 {
            return Err(Error::Config("Port cannot be 0".to_string()));
        }

        let delay = self.throttle.delay_seconds;
        if !delay.is_finite() || delay < 0.0 {
            return Err(Error::Config(format!(
                "Throttle delay must be a non-negative number of seconds, got {}",
                delay
            )));
        }

        if self.throttle.burst == 0 {
            return Err(Error::Config("Throttle burst must be at least 1".to_string()));
        }

        for (name, code) in &self.numerics {
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_digit()) {
                return Err(Error::Config(format!(
                    "Numeric {} must map to a 3-digit code, got '{}'",
                    name, code
                )));
            }
        }

        Ok(())
    }

    /// The standard numeric table with this configuration's additions applied
    pub fn numeric_table(&self) -> NumericTable {
        let mut table = NumericTable::standard();
        for (name, code) in &self.numerics {
            table.insert(name, code);
        }
        table
    }
}
