//! PRIVMSG / NOTICE classification
//!
//! Turns raw PRIVMSG and NOTICE messages into the higher-level events of
//! [`crate::events`]: channel vs. private messages, `/me` actions, CTCP
//! requests and replies, and server notices.

use crate::events::{
    Action, ChannelMessage, Ctcp, PrivateMessage, ServerNotice, CHANNEL_ACTION, CHANNEL_MESSAGE,
    CHANNEL_NOTICE, CTCP_REPLY, CTCP_REPLY_PREFIX, CTCP_REQUEST_PREFIX, MESSAGE_PROCESSOR,
    PRIVATE_ACTION, PRIVATE_MESSAGE, PRIVATE_NOTICE, REGISTRATION, SERVER_NOTICE,
};
use crate::util;
use rustirc_core::{Capability, Client, Event, EventMap, Handler, Hostmask, Message};
use std::sync::Arc;
use tracing::debug;

pub struct MessageProcessor;

impl MessageProcessor {
    /// Source, target and text of a well-formed PRIVMSG/NOTICE
    fn parts(message: &Message) -> Option<(&Hostmask, &str, &str)> {
        match (message.source(), message.arg(0), message.arg(1)) {
            (Some(source), Some(target), Some(text)) => Some((source, target, text)),
            _ => {
                debug!("Ignoring malformed {}", message);
                None
            }
        }
    }

    fn privmsg(client: &Client, message: &Message) {
        let Some((source, target, text)) = Self::parts(message) else {
            return;
        };

        if let Some((command, args)) = util::parse_ctcp(text) {
            let command = command.to_uppercase();
            if command == "ACTION" {
                let private = util::is_nick(target);
                let action = Action {
                    source: source.clone(),
                    channel: (!private).then(|| target.to_string()),
                    text: args.map(str::to_string),
                };
                let name = if private { PRIVATE_ACTION } else { CHANNEL_ACTION };
                client.trigger_handler(name, Event::custom(action));
            } else {
                let request = Ctcp {
                    source: source.clone(),
                    target: target.to_string(),
                    command: command.clone(),
                    args: args.map(str::to_string),
                };
                client.trigger_handler(&format!("{}{}", CTCP_REQUEST_PREFIX, command), Event::custom(request));
            }
        } else if util::is_channel(target) {
            let payload = ChannelMessage {
                source: source.clone(),
                channel: target.to_string(),
                text: text.to_string(),
            };
            client.trigger_handler(CHANNEL_MESSAGE, Event::custom(payload));
        } else {
            let payload = PrivateMessage {
                source: source.clone(),
                text: text.to_string(),
            };
            client.trigger_handler(PRIVATE_MESSAGE, Event::custom(payload));
        }
    }

    fn notice(client: &Client, message: &Message) {
        let Some((source, target, text)) = Self::parts(message) else {
            return;
        };

        if let Some((command, args)) = util::parse_ctcp(text) {
            let reply = Ctcp {
                source: source.clone(),
                target: target.to_string(),
                command: command.to_uppercase(),
                args: args.map(str::to_string),
            };
            let specific = format!("{}{}", CTCP_REPLY_PREFIX, reply.command);
            let event = Event::custom(reply);
            client.trigger_handler(CTCP_REPLY, event.clone());
            client.trigger_handler(&specific, event);
            return;
        }

        if util::is_server(source.nick()) {
            let payload = ServerNotice {
                server: source.nick().to_string(),
                text: text.to_string(),
            };
            client.trigger_handler(SERVER_NOTICE, Event::custom(payload));
        }

        if util::is_channel(target) {
            let payload = ChannelMessage {
                source: source.clone(),
                channel: target.to_string(),
                text: text.to_string(),
            };
            client.trigger_handler(CHANNEL_NOTICE, Event::custom(payload));
        } else {
            let payload = PrivateMessage {
                source: source.clone(),
                text: text.to_string(),
            };
            client.trigger_handler(PRIVATE_NOTICE, Event::custom(payload));
        }
    }
}

impl Handler for MessageProcessor {
    fn name(&self) -> &str {
        "message_processor"
    }

    fn provides(&self) -> Vec<Capability> {
        vec![MESSAGE_PROCESSOR]
    }

    fn dependencies(&self) -> Vec<Capability> {
        vec![REGISTRATION]
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut events = EventMap::new();
        events.on("PRIVMSG", |client, event| async move {
            if let Some(message) = event.as_message() {
                Self::privmsg(&client, message);
            }
            Ok(())
        });
        events.on("NOTICE", |client, event| async move {
            if let Some(message) = event.as_message() {
                Self::notice(&client, message);
            }
            Ok(())
        });
        events
    }
}
