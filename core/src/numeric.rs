//! IRC numeric replies as defined in RFC 1459 / RFC 2812
//!
//! Servers send numerics as 3-digit commands (`001`), while plugins prefer to
//! name them (`RPL_WELCOME`). A [`NumericTable`] is handed to the client as
//! configuration and used by the registry to turn symbolic event names into
//! the raw command the process loop dispatches on.

use std::collections::HashMap;

/// Standard numerics, `(symbolic name, code)`
const STANDARD: &[(&str, &str)] = &[
    // Connection registration
    ("RPL_WELCOME", "001"),
    ("RPL_YOURHOST", "002"),
    ("RPL_CREATED", "003"),
    ("RPL_MYINFO", "004"),
    ("RPL_ISUPPORT", "005"),
    ("RPL_BOUNCE", "010"),
    // Trace and stats
    ("RPL_TRACELINK", "200"),
    ("RPL_TRACECONNECTING", "201"),
    ("RPL_TRACEHANDSHAKE", "202"),
    ("RPL_TRACEUNKNOWN", "203"),
    ("RPL_TRACEOPERATOR", "204"),
    ("RPL_TRACEUSER", "205"),
    ("RPL_TRACESERVER", "206"),
    ("RPL_TRACESERVICE", "207"),
    ("RPL_TRACENEWTYPE", "208"),
    ("RPL_TRACECLASS", "209"),
    ("RPL_STATSLINKINFO", "211"),
    ("RPL_STATSCOMMANDS", "212"),
    ("RPL_ENDOFSTATS", "219"),
    ("RPL_UMODEIS", "221"),
    ("RPL_SERVLIST", "234"),
    ("RPL_SERVLISTEND", "235"),
    ("RPL_STATSUPTIME", "242"),
    ("RPL_STATSOLINE", "243"),
    ("RPL_LUSERCLIENT", "251"),
    ("RPL_LUSEROP", "252"),
    ("RPL_LUSERUNKNOWN", "253"),
    ("RPL_LUSERCHANNELS", "254"),
    ("RPL_LUSERME", "255"),
    ("RPL_ADMINME", "256"),
    ("RPL_ADMINLOC1", "257"),
    ("RPL_ADMINLOC2", "258"),
    ("RPL_ADMINEMAIL", "259"),
    ("RPL_TRACELOG", "261"),
    ("RPL_TRACEEND", "262"),
    ("RPL_TRYAGAIN", "263"),
    ("RPL_LOCALUSERS", "265"),
    ("RPL_GLOBALUSERS", "266"),
    // Command responses
    ("RPL_AWAY", "301"),
    ("RPL_USERHOST", "302"),
    ("RPL_ISON", "303"),
    ("RPL_UNAWAY", "305"),
    ("RPL_NOWAWAY", "306"),
    ("RPL_WHOISUSER", "311"),
    ("RPL_WHOISSERVER", "312"),
    ("RPL_WHOISOPERATOR", "313"),
    ("RPL_WHOWASUSER", "314"),
    ("RPL_ENDOFWHO", "315"),
    ("RPL_WHOISIDLE", "317"),
    ("RPL_ENDOFWHOIS", "318"),
    ("RPL_WHOISCHANNELS", "319"),
    ("RPL_LISTSTART", "321"),
    ("RPL_LIST", "322"),
    ("RPL_LISTEND", "323"),
    ("RPL_CHANNELMODEIS", "324"),
    ("RPL_CREATIONTIME", "329"),
    ("RPL_WHOISLOGGEDIN", "330"),
    ("RPL_NOTOPIC", "331"),
    ("RPL_TOPIC", "332"),
    ("RPL_TOPICWHOTIME", "333"),
    ("RPL_INVITING", "341"),
    ("RPL_INVITELIST", "346"),
    ("RPL_ENDOFINVITELIST", "347"),
    ("RPL_EXCEPTLIST", "348"),
    ("RPL_ENDOFEXCEPTLIST", "349"),
    ("RPL_VERSION", "351"),
    ("RPL_WHOREPLY", "352"),
    ("RPL_NAMREPLY", "353"),
    ("RPL_LINKS", "364"),
    ("RPL_ENDOFLINKS", "365"),
    ("RPL_ENDOFNAMES", "366"),
    ("RPL_BANLIST", "367"),
    ("RPL_ENDOFBANLIST", "368"),
    ("RPL_ENDOFWHOWAS", "369"),
    ("RPL_INFO", "371"),
    ("RPL_MOTD", "372"),
    ("RPL_ENDOFINFO", "374"),
    ("RPL_MOTDSTART", "375"),
    ("RPL_ENDOFMOTD", "376"),
    ("RPL_YOUREOPER", "381"),
    ("RPL_REHASHING", "382"),
    ("RPL_YOURESERVICE", "383"),
    ("RPL_TIME", "391"),
    ("RPL_USERSSTART", "392"),
    ("RPL_USERS", "393"),
    ("RPL_ENDOFUSERS", "394"),
    ("RPL_NOUSERS", "395"),
    ("RPL_HOSTHIDDEN", "396"),
    // Errors
    ("ERR_NOSUCHNICK", "401"),
    ("ERR_NOSUCHSERVER", "402"),
    ("ERR_NOSUCHCHANNEL", "403"),
    ("ERR_CANNOTSENDTOCHAN", "404"),
    ("ERR_TOOMANYCHANNELS", "405"),
    ("ERR_WASNOSUCHNICK", "406"),
    ("ERR_TOOMANYTARGETS", "407"),
    ("ERR_NOORIGIN", "409"),
    ("ERR_NORECIPIENT", "411"),
    ("ERR_NOTEXTTOSEND", "412"),
    ("ERR_UNKNOWNCOMMAND", "421"),
    ("ERR_NOMOTD", "422"),
    ("ERR_NONICKNAMEGIVEN", "431"),
    ("ERR_ERRONEUSNICKNAME", "432"),
    ("ERR_NICKNAMEINUSE", "433"),
    ("ERR_NICKCOLLISION", "436"),
    ("ERR_UNAVAILRESOURCE", "437"),
    ("ERR_USERNOTINCHANNEL", "441"),
    ("ERR_NOTONCHANNEL", "442"),
    ("ERR_USERONCHANNEL", "443"),
    ("ERR_NOTREGISTERED", "451"),
    ("ERR_NEEDMOREPARAMS", "461"),
    ("ERR_ALREADYREGISTRED", "462"),
    ("ERR_PASSWDMISMATCH", "464"),
    ("ERR_YOUREBANNEDCREEP", "465"),
    ("ERR_KEYSET", "467"),
    ("ERR_CHANNELISFULL", "471"),
    ("ERR_UNKNOWNMODE", "472"),
    ("ERR_INVITEONLYCHAN", "473"),
    ("ERR_BANNEDFROMCHAN", "474"),
    ("ERR_BADCHANNELKEY", "475"),
    ("ERR_BADCHANMASK", "476"),
    ("ERR_NOPRIVILEGES", "481"),
    ("ERR_CHANOPRIVSNEEDED", "482"),
    ("ERR_CANTKILLSERVER", "483"),
    ("ERR_RESTRICTED", "484"),
    ("ERR_NOOPERHOST", "491"),
    ("ERR_UMODEUNKNOWNFLAG", "501"),
    ("ERR_USERSDONTMATCH", "502"),
    // Extensions
    ("RPL_WHOISSECURE", "671"),
    ("RPL_LOGGEDIN", "900"),
    ("RPL_LOGGEDOUT", "901"),
    ("ERR_NICKLOCKED", "902"),
    ("RPL_SASLSUCCESS", "903"),
    ("ERR_SASLFAIL", "904"),
    ("ERR_SASLTOOLONG", "905"),
    ("ERR_SASLABORTED", "906"),
    ("ERR_SASLALREADY", "907"),
    ("RPL_SASLMECHS", "908"),
];

/// Bidirectional symbolic-name / numeric-code lookup table
#[derive(Debug, Clone, Default)]
pub struct NumericTable {
    by_name: HashMap<String, String>,
    by_code: HashMap<String, String>,
}

impl NumericTable {
    /// An empty table: no symbolic names are translated
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard RFC 1459 / 2812 table plus common extensions
    pub fn standard() -> Self {
        let mut table = Self::empty();
        for (name, code) in STANDARD {
            table.insert(name, code);
        }
        table
    }

    /// Add (or override) an entry
    pub fn insert(&mut self, name: &str, code: &str) {
        let name = name.to_uppercase();
        if let Some(old_code) = self.by_name.insert(name.clone(), code.to_string()) {
            self.by_code.remove(&old_code);
        }
        self.by_code.insert(code.to_string(), name);
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, name: &str, code: &str) -> Self {
        self.insert(name, code);
        self
    }

    /// Numeric code for a symbolic name
    pub fn code_for(&self, name: &str) -> Option<&str> {
        self.by_name.get(&name.to_uppercase()).map(String::as_str)
    }

    /// Symbolic name for a numeric code
    pub fn name_for(&self, code: &str) -> Option<&str> {
        self.by_code.get(code).map(String::as_str)
    }

    /// Event key a handler's event name is registered under
    ///
    /// Symbolic numeric names become their code; anything else is kept as is.
    pub fn event_key(&self, event: &str) -> String {
        self.code_for(event)
            .map(str::to_string)
            .unwrap_or_else(|| event.to_string())
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_lookups() {
        let table = NumericTable::standard();
        assert_eq!(table.code_for("RPL_WELCOME"), Some("001"));
        assert_eq!(table.code_for("err_nicknameinuse"), Some("433"));
        assert_eq!(table.name_for("005"), Some("RPL_ISUPPORT"));
        assert_eq!(table.name_for("999"), None);
    }

    #[test]
    fn test_event_key_translation() {
        let table = NumericTable::standard();
        assert_eq!(table.event_key("RPL_WELCOME"), "001");
        assert_eq!(table.event_key("PING"), "PING");
        assert_eq!(table.event_key("client_connected"), "client_connected");
        assert_eq!(table.event_key("ctcp_request_VERSION"), "ctcp_request_VERSION");
    }

    #[test]
    fn test_override_replaces_reverse_entry() {
        let table = NumericTable::empty()
            .with("RPL_CUSTOM", "742")
            .with("RPL_CUSTOM", "743");
        assert_eq!(table.code_for("RPL_CUSTOM"), Some("743"));
        assert_eq!(table.name_for("742"), None);
        assert_eq!(table.name_for("743"), Some("RPL_CUSTOM"));
        assert_eq!(table.len(), 1);
    }
}
