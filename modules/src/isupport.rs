//! RPL_ISUPPORT (005) tracking
//!
//! Collects the server's feature tokens into an [`ISupportTokens`]
//! extension. The collection is reset on RPL_VERSION, which servers send
//! right before their ISUPPORT lines.

use rustirc_core::event::{CLIENT_LOAD, CLIENT_UNLOAD};
use rustirc_core::{EventMap, Handler};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Advertised server features: token name -> value (`None` for flags)
#[derive(Debug, Default)]
pub struct ISupportTokens {
    tokens: RwLock<HashMap<String, Option<String>>>,
}

impl ISupportTokens {
    /// `Some(None)` for a flag token, `Some(Some(value))` for a valued one
    pub fn get(&self, token: &str) -> Option<Option<String>> {
        self.tokens.read().get(&token.to_uppercase()).cloned()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.read().contains_key(&token.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }

    fn insert(&self, token: &str) {
        let (name, value) = match token.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (token, None),
        };
        self.tokens.write().insert(name.to_uppercase(), value);
    }

    fn clear(&self) {
        self.tokens.write().clear();
    }
}

pub struct ISupport;

impl Handler for ISupport {
    fn name(&self) -> &str {
        "isupport"
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut events = EventMap::new();

        events.on(CLIENT_LOAD, |client, _| async move {
            client.insert_extension(ISupportTokens::default());
            Ok(())
        });

        events.on(CLIENT_UNLOAD, |client, _| async move {
            client.remove_extension::<ISupportTokens>();
            Ok(())
        });

        events.on("RPL_VERSION", |client, _| async move {
            if let Some(tokens) = client.extension::<ISupportTokens>() {
                tokens.clear();
            }
            Ok(())
        });

        events.on("RPL_ISUPPORT", |client, event| async move {
            let (Some(message), Some(tokens)) = (event.as_message(), client.extension::<ISupportTokens>()) else {
                return Ok(());
            };
            // <client> <token>... :are supported by this server
            let args = message.args();
            if args.len() > 2 {
                for token in &args[1..args.len() - 1] {
                    tokens.insert(token);
                }
            }
            debug!("Server supports {} ISUPPORT token(s)", tokens.len());
            Ok(())
        });

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_collects_and_resets_tokens() {
        let (client, _rx) = client_with_recorder(&[]);
        client.add_handler(Arc::new(ISupport)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        receive(
            &client,
            ":irc.example.net 005 bot CHANTYPES=# EXCEPTS NETWORK=Example :are supported by this server",
        );
        tokio::time::sleep(Duration::from_millis(20)).await;

        let tokens = client.extension::<ISupportTokens>().unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens.get("network"), Some(Some("Example".to_string())));
        assert_eq!(tokens.get("EXCEPTS"), Some(None));
        assert!(!tokens.contains("PREFIX"));

        receive(&client, ":irc.example.net 351 bot ircd-1.0 irc.example.net :comments");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(tokens.is_empty());
    }

    #[tokio::test]
    async fn test_extension_removed_on_unload() {
        let (client, _rx) = client_with_recorder(&[]);
        let id = client.add_handler(Arc::new(ISupport)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(client.extension::<ISupportTokens>().is_some());

        client.remove_handler(id).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(client.extension::<ISupportTokens>().is_none());
    }
}
