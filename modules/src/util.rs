//! Helpers shared by the plugins: CTCP framing and target classification

const CTCP_DELIM: char = '\u{1}';

/// Whether `text` is a CTCP payload (`\x01...\x01`)
pub fn is_ctcp(text: &str) -> bool {
    text.len() >= 2 && text.starts_with(CTCP_DELIM) && text.ends_with(CTCP_DELIM)
}

/// Split a CTCP payload into its command and optional arguments
pub fn parse_ctcp(text: &str) -> Option<(&str, Option<&str>)> {
    if !is_ctcp(text) {
        return None;
    }
    let inner = &text[1..text.len() - 1];
    match inner.split_once(' ') {
        Some((command, args)) => Some((command, Some(args))),
        None => Some((inner, None)),
    }
}

/// Build a CTCP payload; the command is upper-cased
pub fn ctcp(command: &str, args: &[&str]) -> String {
    let mut payload = String::new();
    payload.push(CTCP_DELIM);
    payload.push_str(&command.to_uppercase());
    for arg in args {
        payload.push(' ');
        payload.push_str(arg);
    }
    payload.push(CTCP_DELIM);
    payload
}

/// Channel names start with a non-letter (`#`, `&`, `!`, `+`)
pub fn is_channel(text: &str) -> bool {
    text.chars().next().map(|c| !c.is_alphabetic()).unwrap_or(false)
}

pub fn is_nick(text: &str) -> bool {
    text.chars().next().map(char::is_alphabetic).unwrap_or(false) && !is_server(text)
}

/// Server names contain a dot, nicknames cannot
pub fn is_server(text: &str) -> bool {
    text.contains('.')
}
