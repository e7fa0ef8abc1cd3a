//! Connection registration (USER/NICK) and the client's identity

use crate::events::REGISTRATION;
use rustirc_core::event::{CLIENT_CONNECTED, CLIENT_LOAD, CLIENT_UNLOAD};
use rustirc_core::{commands, Capability, EventMap, Handler};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Who the client is on the network, published as a client extension
///
/// The nickname changes over the life of a connection (collisions, NICK),
/// so it sits behind a lock.
#[derive(Debug)]
pub struct Identity {
    nick: RwLock<String>,
    user: String,
    gecos: String,
}

impl Identity {
    pub fn new(nick: impl Into<String>, user: impl Into<String>, gecos: impl Into<String>) -> Self {
        Self {
            nick: RwLock::new(nick.into()),
            user: user.into(),
            gecos: gecos.into(),
        }
    }

    pub fn nick(&self) -> String {
        self.nick.read().clone()
    }

    pub fn set_nick(&self, nick: impl Into<String>) {
        *self.nick.write() = nick.into();
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn gecos(&self) -> &str {
        &self.gecos
    }
}

/// Registers the connection with USER and NICK once connected
pub struct Registration {
    nick: String,
    user: String,
    gecos: String,
}

impl Registration {
    pub fn new(nick: impl Into<String>, user: impl Into<String>, gecos: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            user: user.into(),
            gecos: gecos.into(),
        }
    }
}

impl Handler for Registration {
    fn name(&self) -> &str {
        "registration"
    }

    fn provides(&self) -> Vec<Capability> {
        vec![REGISTRATION]
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut events = EventMap::new();

        let this = self.clone();
        events.on(CLIENT_LOAD, move |client, _| {
            let this = this.clone();
            async move {
                client.insert_extension(Identity::new(&this.nick, &this.user, &this.gecos));
                Ok(())
            }
        });

        events.on(CLIENT_UNLOAD, |client, _| async move {
            client.remove_extension::<Identity>();
            Ok(())
        });

        events.on(CLIENT_CONNECTED, move |client, _| {
            let this = self.clone();
            async move {
                info!("Registering as {} ({})", this.nick, this.user);
                client.send(commands::user(&this.user, "0", "*", &this.gecos)?);
                client.send(commands::nick(&this.nick)?);
                match client.extension::<Identity>() {
                    Some(identity) => identity.set_nick(&this.nick),
                    None => {
                        client.insert_extension(Identity::new(&this.nick, &this.user, &this.gecos));
                    }
                }
                Ok(())
            }
        });

        events
    }
}
