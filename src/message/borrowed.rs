
use crate::command::{Command, CommandRef};
use crate::error::MessageParseError;
use crate::prefix::{Prefix, PrefixRef};

use super::nom_parser::ParsedMessage;
use super::tags::unescape_tag_value;
use super::types::{Message, Tag};

#[derive(Clone, PartialEq, Debug)]
pub struct MessageRef<'a> {
    pub tags: Option<&'a str>,
    pub prefix: Option<PrefixRef<'a>>,
    pub command: CommandRef<'a>,
    pub raw: &'a str,
}

impl<'a> MessageRef<'a> {
    pub fn parse(s: &'a str) -> Result<MessageRef<'a>, MessageParseError> {
        if s.is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        let trimmed = s.trim_end_matches(['\r', '\n']);

        let parsed = match ParsedMessage::parse(trimmed) {
            Ok(m) => m,
            Err(_e) => return Err(MessageParseError::InvalidCommand),
        };

        let prefix = parsed.prefix.map(PrefixRef::parse);
        let command = CommandRef::new(parsed.command, parsed.params.clone());

        Ok(MessageRef {
            tags: parsed.tags,
            prefix,
            command,
            raw: s,
        })
    }

    /// Whether a tag with this key is present in the raw tag string.
    #[must_use]
    pub fn has_tag(&self, key: &str) -> bool {
        self.raw_tags().any(|(k, _)| k == key)
    }

    /// The raw (still wire-escaped) value of a tag by key, if present. A
    /// value-less (flag-style) tag yields `Some("")`. Use
    /// [`to_owned`](Self::to_owned) first if you need unescaped values.
    #[must_use]
    pub fn tag_value(&self, key: &str) -> Option<&'a str> {
        self.raw_tags()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.unwrap_or(""))
    }

    fn raw_tags(&self) -> impl Iterator<Item = (&'a str, Option<&'a str>)> {
        self.tags
            .into_iter()
            .flat_map(|raw| raw.split(';'))
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (k, Some(v)),
                None => (pair, None),
            })
    }

    /// Convert this borrowed view into an owned [`Message`].
    #[must_use]
    pub fn to_owned(&self) -> Message {
        let tags = self.tags.map(|_| {
            self.raw_tags()
                .map(|(k, v)| Tag(k.to_owned(), v.map(unescape_tag_value)))
                .collect::<Vec<_>>()
        });
        let prefix = self.prefix.as_ref().map(|p| Prefix::new_from_str(p.raw));
        let command = Command::new(self.command.name, self.command.args.clone())
            .unwrap_or_else(|_| Command::Raw(self.command.name.to_owned(), self.command.args.iter().map(|s| (*s).to_owned()).collect()));
        Message {
            tags,
            prefix,
            command,
        }
    }

    /// The raw command verb or numeric code, as it appeared on the wire.
    #[must_use]
    pub fn command_name(&self) -> &'a str {
        self.command.name
    }

    /// The command's parameters, in wire order.
    #[must_use]
    pub fn args(&self) -> &[&'a str] {
        &self.command.args
    }

    /// The parameter at `index`, if present.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&'a str> {
        self.command.args.get(index).copied()
    }

    /// Whether the command verb is a three-digit numeric reply.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        let name = self.command.name;
        name.len() == 3 && name.bytes().all(|b| b.is_ascii_digit())
    }

    /// The numeric reply code, if this message's command is numeric.
    #[must_use]
    pub fn numeric_code(&self) -> Option<u16> {
        self.is_numeric().then(|| self.command.name.parse::<u16>().ok()).flatten()
    }

    /// The nickname of the message's source, if it has a client (not
    /// server) prefix.
    #[must_use]
    pub fn source_nickname(&self) -> Option<&'a str> {
        self.prefix
            .as_ref()
            .filter(|p| !p.is_server())
            .map(|p| p.nick_or_server)
    }

    /// The ident/username of the message's source, if present.
    #[must_use]
    pub fn source_user(&self) -> Option<&'a str> {
        self.prefix.as_ref().and_then(|p| p.user)
    }

    /// The host of the message's source, if present.
    #[must_use]
    pub fn source_host(&self) -> Option<&'a str> {
        self.prefix.as_ref().and_then(|p| p.host)
    }

    pub fn to_raw_owned(&self) -> String {
        let mut s = String::new();
        if let Some(tags) = &self.tags {
            s.push('@');
            s.push_str(tags);
            s.push(' ');
        }
        if let Some(prefix) = &self.prefix {
            s.push(':');
            s.push_str(prefix.raw);
            s.push(' ');
        }
        s.push_str(self.command.name);
        if !self.command.args.is_empty() {
            s.push(' ');
            s.push_str(&self.command.args.join(" "));
        }
        s
    }
}
