//! IRC message parsing and rendering
//!
//! Implements the RFC 1459 line grammar:
//! `[':' prefix SPACE] command (SPACE arg)* [SPACE ':' trailing]`.
//! Messages are validated when constructed so that rendering can never
//! produce a line the server would split differently.

use crate::{Error, Hostmask, Result};
use std::fmt;
use std::str::FromStr;

/// An IRC protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    source: Option<Hostmask>,
    command: String,
    args: Vec<String>,
}

impl Message {
    /// Create a new message without a source
    pub fn new<C, I, A>(command: C, args: I) -> Result<Self>
    where
        C: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self::build(None, command.into(), args.into_iter().map(Into::into).collect())
    }

    /// Create a new message with a source prefix
    pub fn with_source<C, I, A>(source: Hostmask, command: C, args: I) -> Result<Self>
    where
        C: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self::build(
            Some(source),
            command.into(),
            args.into_iter().map(Into::into).collect(),
        )
    }

    fn build(source: Option<Hostmask>, command: String, args: Vec<String>) -> Result<Self> {
        validate_command(&command)?;
        validate_args(&args)?;
        Ok(Self {
            source,
            command,
            args,
        })
    }

    /// Parse a single line (with or without the trailing CRLF)
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(Error::MessageParse("Empty message".to_string()));
        }

        let (source, rest) = match line.strip_prefix(':') {
            Some(prefixed) => {
                let (prefix, rest) = prefixed.split_once(' ').ok_or_else(|| {
                    Error::MessageParse(format!("No command after prefix in '{}'", line))
                })?;
                (Some(Hostmask::parse(prefix)?), rest)
            }
            None => (None, line),
        };

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };

        let mut parts = head.split(' ');
        let command = parts
            .next()
            .filter(|command| !command.is_empty())
            .ok_or_else(|| Error::MessageParse(format!("No command found in '{}'", line)))?;
        validate_command(command).map_err(|e| Error::MessageParse(e.to_string()))?;

        let mut args: Vec<String> = parts.map(str::to_string).collect();
        if let Some(trailing) = trailing {
            args.push(trailing.to_string());
        }

        Ok(Self {
            source,
            command: command.to_string(),
            args,
        })
    }

    /// Render the message as a wire line, without the CRLF terminator
    pub fn render(&self) -> String {
        let mut result = String::new();

        if let Some(ref source) = self.source {
            result.push(':');
            result.push_str(&source.to_string());
            result.push(' ');
        }

        result.push_str(&self.command);

        if let Some((last, leading)) = self.args.split_last() {
            for arg in leading {
                result.push(' ');
                result.push_str(arg);
            }
            result.push(' ');
            if needs_trailing(last) {
                result.push(':');
            }
            result.push_str(last);
        }

        result
    }

    pub fn source(&self) -> Option<&Hostmask> {
        self.source.as_ref()
    }

    /// The command exactly as received or constructed
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The event key this message is dispatched under
    pub fn event_key(&self) -> String {
        self.command.to_uppercase()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Argument at `index`, if present
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

/// Whether an argument has to be sent in the trailing (`:`-prefixed) form
fn needs_trailing(arg: &str) -> bool {
    arg.is_empty() || arg.contains(' ') || arg.starts_with(':')
}

fn validate_command(command: &str) -> Result<()> {
    if command.is_empty() {
        return Err(Error::ProtocolViolation("Empty command".to_string()));
    }
    if command.starts_with(':') || command.contains([' ', '\r', '\n', '\0']) {
        return Err(Error::ProtocolViolation(format!(
            "Invalid command '{}'",
            command.escape_debug()
        )));
    }
    Ok(())
}

fn validate_args(args: &[String]) -> Result<()> {
    let last = args.len().saturating_sub(1);
    for (i, arg) in args.iter().enumerate() {
        if arg.contains(['\r', '\n', '\0']) {
            return Err(Error::ProtocolViolation(format!(
                "Argument '{}' contains a line terminator",
                arg.escape_debug()
            )));
        }
        if i != last && (arg.contains(' ') || arg.starts_with(':')) {
            return Err(Error::ProtocolViolation(format!(
                "Argument '{}' must be the last argument",
                arg
            )));
        }
    }
    Ok(())
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromStr for Message {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
