//! Higher-level events derived from raw messages
//!
//! [`MessageProcessor`](crate::MessageProcessor) and the command plugins
//! dispatch these names with the matching payload type, which callbacks
//! read back with `Event::downcast`.

use rustirc_core::{Capability, Hostmask};

pub const CHANNEL_MESSAGE: &str = "channel_message";
pub const PRIVATE_MESSAGE: &str = "private_message";
pub const CHANNEL_ACTION: &str = "channel_action";
pub const PRIVATE_ACTION: &str = "private_action";
pub const CTCP_REPLY: &str = "ctcp_reply";
pub const SERVER_NOTICE: &str = "server_notice";
pub const CHANNEL_NOTICE: &str = "channel_notice";
pub const PRIVATE_NOTICE: &str = "private_notice";
pub const GLOBAL_COMMAND: &str = "global_command";

/// Prefix of `ctcp_request_<COMMAND>` events
pub const CTCP_REQUEST_PREFIX: &str = "ctcp_request_";
/// Prefix of `ctcp_reply_<COMMAND>` events
pub const CTCP_REPLY_PREFIX: &str = "ctcp_reply_";
/// Prefix of `command_<name>` events
pub const COMMAND_PREFIX: &str = "command_";

/// Provided by [`Registration`](crate::Registration)
pub const REGISTRATION: Capability = Capability::new("registration");
/// Provided by [`MessageProcessor`](crate::MessageProcessor)
pub const MESSAGE_PROCESSOR: Capability = Capability::new("message_processor");
/// Provided by the command plugins
pub const COMMANDS: Capability = Capability::new("commands");

/// Payload of `channel_message` and `channel_notice`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub source: Hostmask,
    pub channel: String,
    pub text: String,
}

/// Payload of `private_message` and `private_notice`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateMessage {
    pub source: Hostmask,
    pub text: String,
}

/// Payload of `channel_action` and `private_action` (`/me`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub source: Hostmask,
    /// Set for channel actions
    pub channel: Option<String>,
    pub text: Option<String>,
}

/// Payload of `ctcp_request_*`, `ctcp_reply` and `ctcp_reply_*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ctcp {
    pub source: Hostmask,
    pub target: String,
    /// Upper-cased
    pub command: String,
    pub args: Option<String>,
}

/// Payload of `server_notice`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerNotice {
    pub server: String,
    pub text: String,
}

/// Payload of `global_command` and `command_*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Lower-cased command name
    pub name: String,
    pub source: Hostmask,
    /// Channel the command was given in; `None` for private commands
    pub target: Option<String>,
    pub args: String,
}
