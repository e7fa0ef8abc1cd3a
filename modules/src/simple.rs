//! Ready-made bot assembly

use crate::{
    AutoJoin, AutoReconnect, BasicCtcp, BotConfig, ChannelCommands, EventLogger, ISupport,
    LogCommands, MessageProcessor, NickInUse, Oper, Ping, PrivateCommands, QuitWhenAsked,
    Registration, Sasl, ShutdownOnError,
};
use rustirc_core::{Client, Result};
use std::sync::Arc;
use tracing::debug;

/// Build a client with the standard plugins plus whatever `config` enables
///
/// Must be called from within a Tokio runtime.
pub fn simple_client(config: &BotConfig) -> Result<Client> {
    let client = Client::new(config.client.clone());
    let identity = &config.identity;
    let behaviour = &config.behaviour;

    client.add_handler(Arc::new(Ping))?;
    client.add_handler(Arc::new(Registration::new(
        &identity.nick,
        &identity.user,
        &identity.gecos,
    )))?;
    client.add_handler(Arc::new(NickInUse))?;
    client.add_handler(Arc::new(ISupport))?;
    client.add_handler(Arc::new(MessageProcessor))?;
    client.add_handler(Arc::new(BasicCtcp::new(&behaviour.ctcp_version)))?;

    if behaviour.auto_reconnect {
        client.add_handler(Arc::new(AutoReconnect::new(behaviour.reconnect_delay())))?;
    } else {
        client.add_handler(Arc::new(ShutdownOnError))?;
    }

    if !behaviour.autojoin.is_empty() {
        client.add_handler(Arc::new(AutoJoin::new(behaviour.autojoin.iter().cloned())))?;
    }
    if let Some(sasl) = &config.sasl {
        client.add_handler(Arc::new(Sasl::new(&sasl.account, &sasl.password)))?;
    }
    if let Some(oper) = &config.oper {
        client.add_handler(Arc::new(Oper::new(&oper.name, &oper.password)))?;
    }
    if behaviour.log_events {
        client.add_handler(Arc::new(EventLogger))?;
    }
    if let Some(prefix) = &behaviour.command_prefix {
        client.add_handler(Arc::new(ChannelCommands::new(prefix)?))?;
        client.add_handler(Arc::new(PrivateCommands))?;
        client.add_handler(Arc::new(QuitWhenAsked))?;
        client.add_handler(Arc::new(LogCommands))?;
    }

    debug!("Assembled client with {} handler(s)", client.handler_count());
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{COMMANDS, MESSAGE_PROCESSOR, REGISTRATION};
    use crate::SaslConfig;

    #[tokio::test]
    async fn test_minimal_bot() {
        let client = simple_client(&BotConfig::default()).unwrap();
        // ping, registration, nick, isupport, processor, ctcp, shutdown, logger
        assert_eq!(client.handler_count(), 8);

        let registration = client.satisfier(REGISTRATION).unwrap();
        assert_eq!(client.refcount(registration), Some(1));
        let processor = client.satisfier(MESSAGE_PROCESSOR).unwrap();
        assert_eq!(client.refcount(processor), Some(1));
        assert!(client.satisfier(COMMANDS).is_none());
    }

    #[tokio::test]
    async fn test_full_bot() {
        let mut config = BotConfig::default();
        config.behaviour.auto_reconnect = true;
        config.behaviour.autojoin = vec!["#rust".to_string()];
        config.behaviour.command_prefix = Some("!".to_string());
        config.sasl = Some(SaslConfig {
            account: "bot".to_string(),
            password: "pw".to_string(),
        });

        let client = simple_client(&config).unwrap();
        assert_eq!(client.handler_count(), 14);

        // Both command plugins depend on the processor; the first provider
        // of `commands` satisfies both command consumers
        let processor = client.satisfier(MESSAGE_PROCESSOR).unwrap();
        assert_eq!(client.refcount(processor), Some(3));
        let commands = client.satisfier(COMMANDS).unwrap();
        assert_eq!(client.refcount(commands), Some(2));
        assert!(client.remove_handler(processor).is_err());
    }
}
