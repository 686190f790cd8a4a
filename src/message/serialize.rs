//! `Display` (human/wire string form, without trailing CRLF) for
//! [`Message`](super::types::Message).

use std::fmt;

use super::tags::escape_tag_value;
use super::types::Message;

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tags) = &self.tags {
            if !tags.is_empty() {
                f.write_str("@")?;
                for (i, tag) in tags.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    f.write_str(&tag.0)?;
                    if let Some(value) = &tag.1 {
                        f.write_str("=")?;
                        escape_tag_value(f, value)?;
                    }
                }
                f.write_str(" ")?;
            }
        }

        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix)?;
        }

        f.write_str(&String::from(&self.command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    #[test]
    fn displays_bare_command() {
        let msg = Message::new(Command::PING("irc.example.com".to_owned(), None));
        assert_eq!(msg.to_string(), "PING :irc.example.com");
    }

    #[test]
    fn displays_tags_and_prefix() {
        let msg = Message::privmsg("#channel", "Hello")
            .with_tag("time", Some("2023-01-01T00:00:00Z"))
            .with_prefix(crate::prefix::Prefix::new_from_str("nick!user@host"));
        assert_eq!(
            msg.to_string(),
            "@time=2023-01-01T00:00:00Z :nick!user@host PRIVMSG #channel :Hello"
        );
    }
}
