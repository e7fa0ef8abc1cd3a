//! Operator login module
//!
//! Sends OPER once registered. Operators are exempt from server flood
//! limits, so throttling is switched off after RPL_YOUREOPER.

use rustirc_core::{commands, EventMap, Handler};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct Oper {
    name: String,
    password: String,
}

impl Oper {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
        }
    }
}

impl Handler for Oper {
    fn name(&self) -> &str {
        "oper"
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut events = EventMap::new();

        events.on("RPL_WELCOME", move |client, _| {
            let this = self.clone();
            async move {
                client.send(commands::oper(&this.name, &this.password)?);
                Ok(())
            }
        });

        events.on("RPL_YOUREOPER", |client, _| async move {
            info!("Now an IRC operator, disabling send throttle");
            client.set_throttle_delay(Duration::ZERO);
            Ok(())
        });

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[tokio::test]
    async fn test_oper_flow() {
        let (client, mut rx) = client_with_recorder(&[]);
        client.add_handler(Arc::new(Oper::new("admin", "secret"))).unwrap();

        receive(&client, ":irc.example.net 001 bot :Welcome");
        assert_eq!(next_sent(&mut rx).await, "OPER admin secret");

        assert_eq!(client.throttle_delay(), Duration::from_secs(2));
        receive(&client, ":irc.example.net 381 bot :You are now an IRC operator");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(client.throttle_delay(), Duration::ZERO);
    }
}
