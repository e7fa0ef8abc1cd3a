//! Bot commands
//!
//! Channel messages starting with the command prefix (`!help`) or
//! addressed to the bot (`bot: help`), and every private message, become a
//! `global_command` event plus a `command_<name>` event carrying a
//! [`Command`].

use crate::events::{
    ChannelMessage, Command, PrivateMessage, CHANNEL_MESSAGE, COMMANDS, COMMAND_PREFIX,
    GLOBAL_COMMAND, MESSAGE_PROCESSOR, PRIVATE_MESSAGE,
};
use crate::registration::Identity;
use regex::Regex;
use rustirc_core::{commands, Capability, Client, Error, Event, EventMap, Handler, Result};
use std::sync::Arc;
use tracing::info;

fn dispatch(client: &Client, command: Command) {
    let specific = format!("{}{}", COMMAND_PREFIX, command.name);
    let event = Event::custom(command);
    client.trigger_handler(GLOBAL_COMMAND, event.clone());
    client.trigger_handler(&specific, event);
}

/// Split `name args...` the way a command line reads
fn split_command(text: &str) -> Option<(String, String)> {
    let (name, args) = text.split_once(' ').unwrap_or((text, ""));
    if name.is_empty() {
        return None;
    }
    Some((name.to_lowercase(), args.to_string()))
}

/// Commands given in channels
pub struct ChannelCommands {
    prefixed: Regex,
}

impl ChannelCommands {
    pub fn new(prefix: &str) -> Result<Self> {
        let pattern = format!("^{}([^ ]+) ?(.*)", regex::escape(prefix));
        let prefixed = Regex::new(&pattern)
            .map_err(|e| Error::Config(format!("Invalid command prefix {:?}: {}", prefix, e)))?;
        Ok(Self { prefixed })
    }

    fn parse(&self, client: &Client, text: &str) -> Option<(String, String)> {
        if let Some(captures) = self.prefixed.captures(text) {
            return Some((captures[1].to_lowercase(), captures[2].to_string()));
        }

        // Addressed by name: "bot: command args" or "bot, command args"
        let nick = client.extension::<Identity>()?.nick();
        let rest = text.strip_prefix(nick.as_str())?;
        let rest = rest.strip_prefix(": ").or_else(|| rest.strip_prefix(", "))?;
        split_command(rest)
    }
}

impl Handler for ChannelCommands {
    fn name(&self) -> &str {
        "channel_commands"
    }

    fn provides(&self) -> Vec<Capability> {
        vec![COMMANDS]
    }

    fn dependencies(&self) -> Vec<Capability> {
        vec![MESSAGE_PROCESSOR]
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut events = EventMap::new();
        events.on(CHANNEL_MESSAGE, move |client, event| {
            let this = self.clone();
            async move {
                let Some(message) = event.downcast::<ChannelMessage>() else {
                    return Ok(());
                };
                if let Some((name, args)) = this.parse(&client, &message.text) {
                    let command = Command {
                        name,
                        source: message.source.clone(),
                        target: Some(message.channel.clone()),
                        args,
                    };
                    dispatch(&client, command);
                }
                Ok(())
            }
        });
        events
    }
}

/// Commands sent to the bot in private
pub struct PrivateCommands;

impl Handler for PrivateCommands {
    fn name(&self) -> &str {
        "private_commands"
    }

    fn provides(&self) -> Vec<Capability> {
        vec![COMMANDS]
    }

    fn dependencies(&self) -> Vec<Capability> {
        vec![MESSAGE_PROCESSOR]
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut events = EventMap::new();
        events.on(PRIVATE_MESSAGE, |client, event| async move {
            let Some(message) = event.downcast::<PrivateMessage>() else {
                return Ok(());
            };
            if let Some((name, args)) = split_command(&message.text) {
                let command = Command {
                    name,
                    source: message.source.clone(),
                    target: None,
                    args,
                };
                dispatch(&client, command);
            }
            Ok(())
        });
        events
    }
}

/// Quits when someone says `quit`
pub struct QuitWhenAsked;

impl Handler for QuitWhenAsked {
    fn name(&self) -> &str {
        "quit_when_asked"
    }

    fn dependencies(&self) -> Vec<Capability> {
        vec![COMMANDS]
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut events = EventMap::new();
        events.on("command_quit", |client, event| async move {
            if let Some(command) = event.downcast::<Command>() {
                let reason = format!("Requested by {}.", command.source.nick());
                client.send(commands::quit(&reason)?);
            }
            Ok(())
        });
        events
    }
}

/// Logs every command given to the bot
pub struct LogCommands;

impl Handler for LogCommands {
    fn name(&self) -> &str {
        "log_commands"
    }

    fn dependencies(&self) -> Vec<Capability> {
        vec![COMMANDS]
    }

    fn events(self: Arc<Self>) -> EventMap {
        let mut events = EventMap::new();
        events.on(GLOBAL_COMMAND, |_, event| async move {
            if let Some(command) = event.downcast::<Command>() {
                info!(
                    "Command: <{} {}> {} {}",
                    command.source,
                    command.target.as_deref().unwrap_or("(private)"),
                    command.name,
                    command.args
                );
            }
            Ok(())
        });
        events
    }
}
