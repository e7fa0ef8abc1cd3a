//! Rust IRC Client Core
//!
//! This crate provides the core of a modular IRC client: the wire codec,
//! the handler (plugin) registry with dependency refcounting, and the
//! connection pipeline that moves messages between the server and the
//! registered handlers.

pub mod buffer;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod hostmask;
pub mod message;
pub mod numeric;
pub mod pipeline;
pub mod registry;
pub mod throttle;
pub mod transport;

mod tasks;


pub use client::Client;
pub use config::{Config, ConnectionConfig, DispatchConfig, ThrottleConfig};
pub use error::{Error, Result};
pub use event::{Event, Step, TransportError};
pub use hostmask::Hostmask;
pub use message::Message;
pub use numeric::NumericTable;
pub use pipeline::ConnectionState;
pub use registry::{
    Callback, CallbackFuture, Capability, Declaration, EventMap, Handler, HandlerId, HandlerRegistry,
};
pub use transport::ConnectionStream;

/// Re-exports for convenience
pub use serde::{Deserialize, Serialize};
pub use tracing::{debug, error, info, warn};
