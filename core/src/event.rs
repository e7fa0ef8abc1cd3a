//! Events delivered to handler callbacks

use crate::Message;
use std::any::Any;
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Fired once the transport is up and the loops are running
pub const CLIENT_CONNECTED: &str = "client_connected";
/// Fired when the transport is closed
pub const CLIENT_DISCONNECTED: &str = "client_disconnected";
/// Fired for every transport failure, carrying an [`Event::Error`]
pub const CLIENT_ERROR: &str = "client_error";
/// Fired for every message passed to `Client::send`, before it is queued
pub const CLIENT_GLOBAL_SEND: &str = "client_global_send";
/// Fired for every received message, before its command event
pub const CLIENT_GLOBAL_RECV: &str = "client_global_recv";
/// Fired for a single handler right after it is registered
pub const CLIENT_LOAD: &str = "client_load";
/// Fired for a single handler right after it is removed
pub const CLIENT_UNLOAD: &str = "client_unload";

/// Pipeline stage a transport failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    None,
    Connect,
    Send,
    Recv,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::None => "none",
            Step::Connect => "connect",
            Step::Send => "send",
            Step::Recv => "recv",
        };
        write!(f, "{}", s)
    }
}

/// A transport failure, delivered through the inbound queue as `client_error`
#[derive(Error, Debug, Clone)]
#[error("I/O error during {step}: {cause}")]
pub struct TransportError {
    cause: Arc<io::Error>,
    step: Step,
}

impl TransportError {
    pub fn new(cause: io::Error, step: Step) -> Self {
        Self {
            cause: Arc::new(cause),
            step,
        }
    }

    pub fn cause(&self) -> &io::Error {
        &self.cause
    }

    pub fn kind(&self) -> io::ErrorKind {
        self.cause.kind()
    }

    pub fn step(&self) -> Step {
        self.step
    }
}

/// Item travelling from the receive loop to the process loop
#[derive(Debug, Clone)]
pub enum Inbound {
    Message(Message),
    Error(TransportError),
}

/// Payload handed to a handler callback
#[derive(Clone)]
pub enum Event {
    /// Lifecycle notifications without a payload
    Lifecycle,
    /// A received (or about to be sent) protocol message
    Message(Arc<Message>),
    /// A transport failure
    Error(TransportError),
    /// Plugin-defined payload, see [`Event::custom`]
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Event {
    pub fn message(message: Message) -> Self {
        Event::Message(Arc::new(message))
    }

    /// Wrap a plugin-defined payload
    pub fn custom<T: Any + Send + Sync>(payload: T) -> Self {
        Event::Custom(Arc::new(payload))
    }

    /// The message, for `Message` events
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Event::Message(message) => Some(message),
            _ => None,
        }
    }

    /// The failure, for `Error` events
    pub fn as_error(&self) -> Option<&TransportError> {
        match self {
            Event::Error(error) => Some(error),
            _ => None,
        }
    }

    /// The payload, for `Custom` events carrying a `T`
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            Event::Custom(payload) => payload.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Lifecycle => write!(f, "Lifecycle"),
            Event::Message(message) => f.debug_tuple("Message").field(message).finish(),
            Event::Error(error) => f.debug_tuple("Error").field(error).finish(),
            Event::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl From<Message> for Event {
    fn from(message: Message) -> Self {
        Event::message(message)
    }
}

impl From<TransportError> for Event {
    fn from(error: TransportError) -> Self {
        Event::Error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Greeting(&'static str);

    #[test]
    fn test_custom_payload_downcast() {
        let event = Event::custom(Greeting("hello"));
        assert_eq!(event.downcast::<Greeting>(), Some(&Greeting("hello")));
        assert!(event.downcast::<String>().is_none());
        assert!(event.as_message().is_none());
    }

    #[test]
    fn test_transport_error_display() {
        let error = TransportError::new(
            io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
            Step::Connect,
        );
        assert_eq!(error.step(), Step::Connect);
        assert_eq!(error.kind(), io::ErrorKind::ConnectionRefused);
        assert_eq!(error.to_string(), "I/O error during connect: refused");
    }
}
