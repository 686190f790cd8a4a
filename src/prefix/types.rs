//! IRC message source ("prefix") types.
//!
//! A prefix identifies the originator of a server-to-client message: either
//! a bare server name, or a `nick[!user][@host]` triple describing a client.

/// The source of an IRC message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Prefix {
    /// A bare server name, e.g. `irc.example.net`.
    ServerName(String),
    /// A client source: nickname, ident/username (empty if absent), host
    /// (empty if absent).
    Nickname(String, String, String),
}

impl Prefix {
    /// Parse a prefix string (`nick!user@host`, `nick@host`, `nick`, or a
    /// bare server name) into a [`Prefix`].
    ///
    /// Distinguishes a server name from a nickname-only prefix by the
    /// presence of a `.` in the token, matching common IRC client heuristics
    /// (server names always contain a dot; nicknames rarely do).
    #[must_use]
    pub fn new_from_str(s: &str) -> Self {
        if let Some(bang) = s.find('!') {
            let nick = &s[..bang];
            let rest = &s[bang + 1..];
            if let Some(at) = rest.find('@') {
                Prefix::Nickname(nick.to_string(), rest[..at].to_string(), rest[at + 1..].to_string())
            } else {
                Prefix::Nickname(nick.to_string(), rest.to_string(), String::new())
            }
        } else if let Some(at) = s.find('@') {
            Prefix::Nickname(s[..at].to_string(), String::new(), s[at + 1..].to_string())
        } else if s.contains('.') {
            Prefix::ServerName(s.to_string())
        } else {
            Prefix::Nickname(s.to_string(), String::new(), String::new())
        }
    }

    /// The nickname if this is a client prefix.
    #[must_use]
    pub fn nickname(&self) -> Option<&str> {
        match self {
            Prefix::Nickname(nick, ..) => Some(nick),
            Prefix::ServerName(_) => None,
        }
    }
}

/// A borrowed, zero-copy view of a prefix string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefixRef<'a> {
    /// The raw prefix text, unparsed (without the leading `:`).
    pub raw: &'a str,
    /// The nickname or server-name component.
    pub nick_or_server: &'a str,
    /// The ident/username component, if present.
    pub user: Option<&'a str>,
    /// The host component, if present.
    pub host: Option<&'a str>,
}

impl<'a> PrefixRef<'a> {
    /// Parse a borrowed prefix from its raw wire text.
    #[must_use]
    pub fn parse(raw: &'a str) -> Self {
        if let Some(bang) = raw.find('!') {
            let nick = &raw[..bang];
            let rest = &raw[bang + 1..];
            if let Some(at) = rest.find('@') {
                PrefixRef {
                    raw,
                    nick_or_server: nick,
                    user: Some(&rest[..at]),
                    host: Some(&rest[at + 1..]),
                }
            } else {
                PrefixRef {
                    raw,
                    nick_or_server: nick,
                    user: Some(rest),
                    host: None,
                }
            }
        } else if let Some(at) = raw.find('@') {
            PrefixRef {
                raw,
                nick_or_server: &raw[..at],
                user: None,
                host: Some(&raw[at + 1..]),
            }
        } else {
            PrefixRef {
                raw,
                nick_or_server: raw,
                user: None,
                host: None,
            }
        }
    }

    /// Whether this looks like a server name rather than a client source.
    #[must_use]
    pub fn is_server(&self) -> bool {
        self.user.is_none() && self.host.is_none() && self.nick_or_server.contains('.')
    }

    /// Convert to an owned [`Prefix`].
    #[must_use]
    pub fn to_owned_prefix(&self) -> Prefix {
        if self.is_server() {
            Prefix::ServerName(self.nick_or_server.to_string())
        } else {
            Prefix::Nickname(
                self.nick_or_server.to_string(),
                self.user.unwrap_or("").to_string(),
                self.host.unwrap_or("").to_string(),
            )
        }
    }
}

/// Validate that `s` is a syntactically legal prefix token: non-empty and
/// free of spaces, NUL, CR and LF (the subset of the arg-validity rule that
/// applies to prefixes, per the wire codec grammar).
#[must_use]
pub fn is_valid_prefix_str(s: &str) -> bool {
    !s.is_empty()
        && !s.chars().any(|c| c == ' ' || c == '\0' || c == '\r' || c == '\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_prefix() {
        let p = Prefix::new_from_str("nick!user@host");
        assert_eq!(p, Prefix::Nickname("nick".into(), "user".into(), "host".into()));
        assert_eq!(p.to_string(), "nick!user@host");
    }

    #[test]
    fn parses_server_name() {
        let p = Prefix::new_from_str("irc.example.net");
        assert_eq!(p, Prefix::ServerName("irc.example.net".into()));
    }

    #[test]
    fn parses_nick_only() {
        let p = Prefix::new_from_str("nick");
        assert_eq!(p, Prefix::Nickname("nick".into(), "".into(), "".into()));
        assert_eq!(p.to_string(), "nick");
    }

    #[test]
    fn prefix_ref_roundtrip() {
        let r = PrefixRef::parse("nick!user@host");
        assert_eq!(r.nick_or_server, "nick");
        assert_eq!(r.user, Some("user"));
        assert_eq!(r.host, Some("host"));
        assert_eq!(r.to_owned_prefix(), Prefix::new_from_str("nick!user@host"));
    }

    #[test]
    fn rejects_invalid_prefix() {
        assert!(!is_valid_prefix_str(""));
        assert!(!is_valid_prefix_str("a b"));
        assert!(is_valid_prefix_str("nick!user@host"));
    }
}
