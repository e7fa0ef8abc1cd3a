//! Error types for the IRC client engine

use crate::registry::{Capability, HandlerId};
use thiserror::Error;

/// Main error type for the IRC client engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Message parsing error: {0}")]
    MessageParse(String),

    /// An argument that needs the trailing form was not the last one, or an
    /// argument/command contains characters that cannot travel on the wire.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Handler '{0}' is already registered")]
    DuplicateHandlerObject(String),

    #[error("Handler {0} is not registered")]
    MissingHandlerObject(HandlerId),

    #[error("Handler '{handler}' requires capability '{capability}' but no registered handler provides it")]
    UnsatisfiedDependency {
        handler: String,
        capability: Capability,
    },

    #[error("Handler '{handler}' is still required by {refcount} other handler(s)")]
    LingeringDependency { handler: String, refcount: usize },

    #[error("Dependency tree is invalid: {0}")]
    InvalidDependencyTree(String),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Generic(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}
