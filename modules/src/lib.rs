//! Rust IRC Client Modules
//!
//! This crate provides reference plugins (handlers) for the IRC client core
//! and a helper that assembles them into a working bot.

pub mod basic;
pub mod command;
pub mod config;
pub mod ctcp;
pub mod events;
pub mod isupport;
pub mod lifecycle;
pub mod oper;
pub mod processor;
pub mod registration;
pub mod sasl;
pub mod simple;
pub mod util;

#[cfg(test)]
mod test_support;

pub use basic::{AutoJoin, NickInUse, Ping};
pub use command::{ChannelCommands, LogCommands, PrivateCommands, QuitWhenAsked};
pub use config::{BehaviourConfig, BotConfig, IdentityConfig, OperConfig, SaslConfig};
pub use ctcp::BasicCtcp;
pub use isupport::{ISupport, ISupportTokens};
pub use lifecycle::{AutoReconnect, EventLogger, ShutdownOnError};
pub use oper::Oper;
pub use processor::MessageProcessor;
pub use registration::{Identity, Registration};
pub use sasl::Sasl;
pub use simple::simple_client;
