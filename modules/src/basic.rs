//! Small protocol plugins: keepalive, nickname collisions and auto-join

use crate::registration::Identity;
use rustirc_core::{commands, EventMap, Handler};
use std::sync::Arc;
use tracing::{debug, info};

/// Answers server PINGs
pub struct Ping;

impl Handler for Ping {
    fn name(&self) -> &str {
        "ping"
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut events = EventMap::new();
        events.on("PING", |client, event| async move {
            match event.as_message().and_then(|m| m.arg(0)) {
                Some(token) => client.send(commands::pong(token)?),
                None => debug!("PING without a token"),
            }
            Ok(())
        });
        events
    }
}

/// Retries registration with `<nick>_` when the nickname is taken
pub struct NickInUse;

impl Handler for NickInUse {
    fn name(&self) -> &str {
        "nick_in_use"
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut events = EventMap::new();
        for numeric in ["ERR_NICKNAMEINUSE", "ERR_NICKCOLLISION"] {
            events.on(numeric, |client, event| async move {
                // <client> <nick> :Nickname is already in use
                let Some(taken) = event.as_message().and_then(|m| m.arg(1)) else {
                    return Ok(());
                };
                let nick = format!("{}_", taken);
                info!("Nickname {} is taken, trying {}", taken, nick);
                if let Some(identity) = client.extension::<Identity>() {
                    identity.set_nick(&nick);
                }
                client.send(commands::nick(&nick)?);
                Ok(())
            });
        }
        events
    }
}

/// Joins a fixed list of channels once the server welcomes us
pub struct AutoJoin {
    channels: Vec<String>,
}

impl AutoJoin {
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
        }
    }
}

impl Handler for AutoJoin {
    fn name(&self) -> &str {
        "autojoin"
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut events = EventMap::new();
        events.on("RPL_WELCOME", move |client, _| {
            let this = self.clone();
            async move {
                for channel in &this.channels {
                    client.send(commands::join(channel)?);
                }
                Ok(())
            }
        });
        events
    }
}
