//! Owned IRC message type and IRCv3 tag representation.

use crate::command::Command;
use crate::prefix::Prefix;

/// A single IRCv3 message tag: `(key, value)`. An absent value (`None`)
/// serializes without a trailing `=` — the canonical form, since an empty
/// value and no value are semantically equivalent on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag(pub String, pub Option<String>);

impl Tag {
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Tag(key.into(), value)
    }
}

/// A complete IRC message: optional tags, optional source prefix, and a
/// typed command.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// IRCv3 message tags, if any were present/attached.
    pub tags: Option<Vec<Tag>>,
    /// The message source, if any (present on server-to-client messages).
    pub prefix: Option<Prefix>,
    /// The parsed command and its arguments.
    pub command: Command,
}

impl Message {
    /// Construct a message with no tags and no prefix.
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            tags: None,
            prefix: None,
            command,
        }
    }

    /// Attach a prefix, replacing any existing one (builder-style).
    #[must_use]
    pub fn with_prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Attach or update a single tag (builder-style). Re-setting an
    /// existing key replaces its value rather than duplicating the tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        let key = key.into();
        let value = value.map(Into::into);
        let tags = self.tags.get_or_insert_with(Vec::new);
        if let Some(existing) = tags.iter_mut().find(|t| t.0 == key) {
            existing.1 = value;
        } else {
            tags.push(Tag(key, value));
        }
        self
    }

    /// Whether a tag with this key is present (regardless of value).
    #[must_use]
    pub fn has_tag(&self, key: &str) -> bool {
        self.tags
            .as_ref()
            .is_some_and(|tags| tags.iter().any(|t| t.0 == key))
    }

    /// The value of a tag by key, if the tag is present. A value-less
    /// (flag-style) tag yields `Some("")`, matching IRCv3 semantics where
    /// an absent value is equivalent to an empty one.
    #[must_use]
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .as_ref()?
            .iter()
            .find(|t| t.0 == key)
            .map(|t| t.1.as_deref().unwrap_or(""))
    }

    /// The nickname of the message's source, if it has a client (not
    /// server) prefix.
    #[must_use]
    pub fn source_nickname(&self) -> Option<&str> {
        match &self.prefix {
            Some(Prefix::Nickname(nick, ..)) => Some(nick),
            _ => None,
        }
    }

    /// The ident/username of the message's source, if present.
    #[must_use]
    pub fn source_user(&self) -> Option<&str> {
        match &self.prefix {
            Some(Prefix::Nickname(_, user, _)) if !user.is_empty() => Some(user),
            _ => None,
        }
    }

    /// The host of the message's source, if present.
    #[must_use]
    pub fn source_host(&self) -> Option<&str> {
        match &self.prefix {
            Some(Prefix::Nickname(_, _, host)) if !host.is_empty() => Some(host),
            _ => None,
        }
    }

    /// Build a `PRIVMSG target :text` message.
    #[must_use]
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Command::PRIVMSG(target.into(), text.into()))
    }

    /// Build a `NOTICE target :text` message.
    #[must_use]
    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Command::NOTICE(target.into(), text.into()))
    }

    /// Build a `JOIN channel` message (no key).
    #[must_use]
    pub fn join(channel: impl Into<String>) -> Self {
        Self::new(Command::JOIN(channel.into(), None, None))
    }

    /// Build a `JOIN channel key` message.
    #[must_use]
    pub fn join_with_key(channel: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(Command::JOIN(channel.into(), Some(key.into()), None))
    }

    /// Build a `PART channel [message]` message.
    #[must_use]
    pub fn part(channel: impl Into<String>, message: Option<impl Into<String>>) -> Self {
        Self::new(Command::PART(channel.into(), message.map(Into::into)))
    }

    /// Build a `NICK nickname` message.
    #[must_use]
    pub fn nick(nickname: impl Into<String>) -> Self {
        Self::new(Command::NICK(nickname.into()))
    }

    /// Build a `PING server` message.
    #[must_use]
    pub fn ping(server: impl Into<String>) -> Self {
        Self::new(Command::PING(server.into(), None))
    }

    /// Build a `PONG server` message.
    #[must_use]
    pub fn pong(server: impl Into<String>) -> Self {
        Self::new(Command::PONG(server.into(), None))
    }

    /// Build a `QUIT [message]` message.
    #[must_use]
    pub fn quit(message: Option<impl Into<String>>) -> Self {
        Self::new(Command::QUIT(message.map(Into::into)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_tag_replaces_existing_key() {
        let msg = Message::privmsg("#chan", "hi")
            .with_tag("time", Some("a"))
            .with_tag("time", Some("b"));
        assert_eq!(msg.tag_value("time"), Some("b"));
        assert_eq!(msg.tags.unwrap().len(), 1);
    }

    #[test]
    fn flag_tag_has_empty_value() {
        let msg = Message::privmsg("#chan", "hi").with_tag::<_, String>("+typing", None);
        assert!(msg.has_tag("+typing"));
        assert_eq!(msg.tag_value("+typing"), Some(""));
    }

    #[test]
    fn builders_produce_expected_commands() {
        assert_eq!(
            Message::join("#rust").command,
            Command::JOIN("#rust".to_owned(), None, None)
        );
        assert_eq!(
            Message::nick("bot").command,
            Command::NICK("bot".to_owned())
        );
    }
}
