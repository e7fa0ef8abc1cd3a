//! Bot configuration
//!
//! Wraps the core client [`Config`] with the settings the reference
//! plugins need. Loaded from TOML:
//!
//! ```toml
//! [client.connection]
//! host = "irc.libera.chat"
//! port = 6697
//! tls = true
//!
//! [identity]
//! nick = "rustbot"
//!
//! [behaviour]
//! autojoin = ["#rust"]
//! command_prefix = "!"
//!
//! [sasl]
//! account = "rustbot"
//! password = "hunter2"
//! ```

use crate::util;
use rustirc_core::{Config, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Core client settings
    pub client: Config,
    pub identity: IdentityConfig,
    pub behaviour: BehaviourConfig,
    /// SASL PLAIN credentials
    pub sasl: Option<SaslConfig>,
    /// OPER credentials
    pub oper: Option<OperConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub nick: String,
    pub user: String,
    /// Real name
    pub gecos: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviourConfig {
    /// Channels joined after registration
    pub autojoin: Vec<String>,
    /// Reconnect after a failure instead of shutting down
    pub auto_reconnect: bool,
    pub reconnect_delay_seconds: u64,
    /// Reply to CTCP VERSION
    pub ctcp_version: String,
    /// Enables bot commands when set
    pub command_prefix: Option<String>,
    /// Log connection events and traffic
    pub log_events: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaslConfig {
    pub account: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperConfig {
    pub name: String,
    pub password: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            nick: "rustirc".to_string(),
            user: "rustirc".to_string(),
            gecos: "rustirc IRC client".to_string(),
        }
    }
}

impl Default for BehaviourConfig {
    fn default() -> Self {
        Self {
            autojoin: Vec::new(),
            auto_reconnect: false,
            reconnect_delay_seconds: 30,
            ctcp_version: concat!("rustirc ", env!("CARGO_PKG_VERSION")).to_string(),
            command_prefix: None,
            log_events: true,
        }
    }
}

impl BehaviourConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_seconds)
    }
}

impl BotConfig {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.client.validate()?;

        let identity = &self.identity;
        if !util::is_nick(&identity.nick) || identity.nick.contains(' ') {
            return Err(Error::Config(format!("Invalid nickname {:?}", identity.nick)));
        }
        if identity.user.is_empty() || identity.user.contains(' ') {
            return Err(Error::Config(format!("Invalid user name {:?}", identity.user)));
        }

        for channel in &self.behaviour.autojoin {
            if !util::is_channel(channel) || channel.contains(' ') || channel.contains(',') {
                return Err(Error::Config(format!("Invalid channel name {:?}", channel)));
            }
        }

        if let Some(prefix) = &self.behaviour.command_prefix {
            if prefix.is_empty() || prefix.contains(' ') {
                return Err(Error::Config(format!("Invalid command prefix {:?}", prefix)));
            }
        }

        if let Some(sasl) = &self.sasl {
            if sasl.account.is_empty() {
                return Err(Error::Config("SASL account cannot be empty".to_string()));
            }
        }

        if let Some(oper) = &self.oper {
            if oper.name.is_empty() || oper.name.contains(' ') || oper.password.contains(' ') {
                return Err(Error::Config("OPER credentials must be single words".to_string()));
            }
        }

        Ok(())
    }
}
