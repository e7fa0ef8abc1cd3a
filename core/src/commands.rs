//! Builders for the client-originated commands plugins send most often
//!
//! Every builder validates its arguments through [`Message::new`], so a
//! text containing a line terminator is rejected here rather than at send time.

use crate::{Message, Result};

pub fn privmsg(target: &str, text: &str) -> Result<Message> {
    Message::new("PRIVMSG", [target, text])
}

pub fn notice(target: &str, text: &str) -> Result<Message> {
    Message::new("NOTICE", [target, text])
}

pub fn ping(token: &str) -> Result<Message> {
    Message::new("PING", [token])
}

pub fn pong(token: &str) -> Result<Message> {
    Message::new("PONG", [token])
}

pub fn join(channel: &str) -> Result<Message> {
    Message::new("JOIN", [channel])
}

/// `JOIN` with a channel key
pub fn join_with_key(channel: &str, key: &str) -> Result<Message> {
    Message::new("JOIN", [channel, key])
}

pub fn part(channel: &str, reason: Option<&str>) -> Result<Message> {
    match reason {
        Some(reason) => Message::new("PART", [channel, reason]),
        None => Message::new("PART", [channel]),
    }
}

/// Registration `USER` line; `mode` and `unused` are usually `*`
pub fn user(username: &str, mode: &str, unused: &str, realname: &str) -> Result<Message> {
    Message::new("USER", [username, mode, unused, realname])
}

pub fn nick(nickname: &str) -> Result<Message> {
    Message::new("NICK", [nickname])
}

pub fn whois(target: &str) -> Result<Message> {
    Message::new("WHOIS", [target])
}

pub fn whowas(target: &str) -> Result<Message> {
    Message::new("WHOWAS", [target])
}

pub fn names(channel: &str) -> Result<Message> {
    Message::new("NAMES", [channel])
}

pub fn who(mask: &str) -> Result<Message> {
    Message::new("WHO", [mask])
}

pub fn oper(name: &str, password: &str) -> Result<Message> {
    Message::new("OPER", [name, password])
}

pub fn quit(reason: &str) -> Result<Message> {
    Message::new("QUIT", [reason])
}

/// `CAP <subcommand> [params...]`
pub fn cap(subcommand: &str, params: &[&str]) -> Result<Message> {
    Message::new("CAP", std::iter::once(subcommand).chain(params.iter().copied()))
}

pub fn authenticate(payload: &str) -> Result<Message> {
    Message::new("AUTHENTICATE", [payload])
}

/// `MODE <target> [modes and params...]`
pub fn mode(target: &str, modes: &[&str]) -> Result<Message> {
    Message::new("MODE", std::iter::once(target).chain(modes.iter().copied()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_render() {
        assert_eq!(pong("irc.example.net").unwrap().render(), "PONG irc.example.net");
        assert_eq!(
            user("bot", "*", "*", "A Bot").unwrap().render(),
            "USER bot * * :A Bot"
        );
        assert_eq!(cap("REQ", &["sasl"]).unwrap().render(), "CAP REQ sasl");
        assert_eq!(cap("END", &[]).unwrap().render(), "CAP END");
        assert_eq!(
            mode("#chan", &["+o", "alice"]).unwrap().render(),
            "MODE #chan +o alice"
        );
        assert_eq!(part("#chan", None).unwrap().render(), "PART #chan");
        assert_eq!(
            quit("Requested by alice.").unwrap().render(),
            "QUIT :Requested by alice."
        );
    }

    #[test]
    fn test_builders_validate() {
        assert!(privmsg("#chan", "hi\r\nQUIT :pwned").is_err());
        assert!(privmsg("#a b", "hi").is_err());
    }
}
