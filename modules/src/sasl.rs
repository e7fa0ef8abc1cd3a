//! SASL authentication module
//!
//! Negotiates the `sasl` capability and authenticates with the PLAIN
//! mechanism during connection registration (IRCv3 `CAP` / `AUTHENTICATE`).

use base64::{engine::general_purpose, Engine as _};
use rustirc_core::event::CLIENT_CONNECTED;
use rustirc_core::{commands, EventMap, Handler, Message};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SASL_CAPABILITY: &str = "SASL";

/// SASL PLAIN authentication
pub struct Sasl {
    /// Base64 of `authzid \0 authcid \0 password`
    payload: String,
}

impl Sasl {
    pub fn new(account: &str, password: &str) -> Self {
        let plain = format!("{}\0{}\0{}", account, account, password);
        Self {
            payload: general_purpose::STANDARD.encode(plain),
        }
    }

    fn handle_cap(&self, message: &Message) -> Option<Message> {
        // <target> <subcommand> [*] :<capabilities>
        let subcommand = message.arg(1)?.to_uppercase();
        let offered = message
            .args()
            .get(2..)?
            .last()?
            .to_uppercase();
        let has_sasl = offered.split_whitespace().any(|cap| cap == SASL_CAPABILITY);

        let reply = match subcommand.as_str() {
            "LS" if has_sasl => commands::cap("REQ", &["sasl"]),
            "LS" => {
                warn!("Server does not offer SASL, continuing unauthenticated");
                commands::cap("END", &[])
            }
            "ACK" if has_sasl => commands::authenticate("PLAIN"),
            "NAK" if has_sasl => {
                warn!("Server refused the SASL capability");
                commands::cap("END", &[])
            }
            _ => return None,
        };
        reply.ok()
    }
}

impl Handler for Sasl {
    fn name(&self) -> &str {
        "sasl"
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut events = EventMap::new();

        events.on(CLIENT_CONNECTED, |client, _| async move {
            client.send(commands::cap("LS", &[])?);
            Ok(())
        });

        let this = self.clone();
        events.on("CAP", move |client, event| {
            let this = this.clone();
            async move {
                if let Some(reply) = event.as_message().and_then(|m| this.handle_cap(m)) {
                    debug!("SASL negotiation: {}", reply);
                    client.send(reply);
                }
                Ok(())
            }
        });

        // Only PLAIN is offered, so any challenge gets the credentials
        events.on("AUTHENTICATE", move |client, _| {
            let this = self.clone();
            async move {
                info!("Sending SASL PLAIN credentials");
                client.send(commands::authenticate(&this.payload)?);
                client.send(commands::cap("END", &[])?);
                Ok(())
            }
        });

        events
    }
}
