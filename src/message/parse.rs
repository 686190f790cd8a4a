//! Parsing raw wire text into an owned [`Message`].

use std::str::FromStr;

use crate::command::Command;
use crate::error::MessageParseError;
use crate::prefix::Prefix;

use super::nom_parser::ParsedMessage;
use super::tags::unescape_tag_value;
use super::types::{Message, Tag};

fn parse_tags(raw: &str) -> Vec<Tag> {
    raw.split(';')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => Tag(key.to_owned(), Some(unescape_tag_value(value))),
            None => Tag(pair.to_owned(), None),
        })
        .collect()
}

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        let trimmed = s.trim_end_matches(['\r', '\n']);
        let parsed = ParsedMessage::parse(trimmed).map_err(|_| MessageParseError::InvalidCommand)?;

        let tags = parsed.tags.map(parse_tags);
        let prefix = parsed.prefix.map(Prefix::new_from_str);
        let command = Command::new(parsed.command, parsed.params)?;

        Ok(Message {
            tags,
            prefix,
            command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_privmsg() {
        let msg: Message = "PRIVMSG #channel :Hello world!".parse().unwrap();
        assert_eq!(
            msg.command,
            Command::PRIVMSG("#channel".to_owned(), "Hello world!".to_owned())
        );
        assert!(msg.prefix.is_none());
        assert!(msg.tags.is_none());
    }

    #[test]
    fn parses_prefix_and_tags() {
        let msg: Message = "@time=2023-01-01T00:00:00Z;msgid=abc :nick!user@host PRIVMSG #test :Hi"
            .parse()
            .unwrap();
        assert_eq!(msg.tag_value("time"), Some("2023-01-01T00:00:00Z"));
        assert_eq!(msg.tag_value("msgid"), Some("abc"));
        assert_eq!(
            msg.prefix,
            Some(Prefix::Nickname(
                "nick".to_owned(),
                "user".to_owned(),
                "host".to_owned()
            ))
        );
    }

    #[test]
    fn rejects_empty_input() {
        assert!("".parse::<Message>().is_err());
    }
}
