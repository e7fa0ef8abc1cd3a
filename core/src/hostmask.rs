//! Message origin addresses (`nick[!user@host]`)

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Origin of a message: a bare server/nick name or a full `nick!user@host`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hostmask {
    nick: String,
    /// `user` and `host` are either both present or both absent
    user_host: Option<(String, String)>,
}

impl Hostmask {
    /// Create a hostmask holding only a nick (or server name)
    pub fn new(nick: impl Into<String>) -> Result<Self> {
        let nick = nick.into();
        validate_part("nick", &nick)?;
        if nick.contains('!') {
            return Err(Error::ProtocolViolation(format!(
                "nick '{}' may not contain '!'",
                nick
            )));
        }
        Ok(Self {
            nick,
            user_host: None,
        })
    }

    /// Create a full `nick!user@host` hostmask
    pub fn with_user_host(
        nick: impl Into<String>,
        user: impl Into<String>,
        host: impl Into<String>,
    ) -> Result<Self> {
        let mut mask = Self::new(nick)?;
        let user = user.into();
        let host = host.into();
        validate_part("user", &user)?;
        validate_part("host", &host)?;
        if user.contains('@') {
            return Err(Error::ProtocolViolation(format!(
                "user '{}' may not contain '@'",
                user
            )));
        }
        mask.user_host = Some((user, host));
        Ok(mask)
    }

    /// Parse a message prefix (without the leading `:`)
    pub fn parse(text: &str) -> Result<Self> {
        match text.split_once('!') {
            Some((nick, rest)) => {
                let (user, host) = rest.split_once('@').ok_or_else(|| {
                    Error::MessageParse(format!("prefix '{}' has a user but no host", text))
                })?;
                Self::with_user_host(nick, user, host)
            }
            None => Self::new(text),
        }
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn user(&self) -> Option<&str> {
        self.user_host.as_ref().map(|(user, _)| user.as_str())
    }

    pub fn host(&self) -> Option<&str> {
        self.user_host.as_ref().map(|(_, host)| host.as_str())
    }
}

fn validate_part(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::ProtocolViolation(format!("empty {} in hostmask", what)));
    }
    if value.contains([' ', '\r', '\n', '\0']) {
        return Err(Error::ProtocolViolation(format!(
            "{} '{}' contains whitespace or control characters",
            what,
            value.escape_debug()
        )));
    }
    Ok(())
}

impl fmt::Display for Hostmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.user_host {
            Some((user, host)) => write!(f, "{}!{}@{}", self.nick, user, host),
            None => write!(f, "{}", self.nick),
        }
    }
}

impl FromStr for Hostmask {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
