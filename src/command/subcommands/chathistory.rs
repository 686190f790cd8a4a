//! `CHATHISTORY` subcommand and message-reference types (IRCv3
//! `draft/chathistory`).

use std::fmt;
use std::str::FromStr;

use crate::error::MessageParseError;

/// The `CHATHISTORY` subcommand selecting which slice of history to fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
#[allow(non_camel_case_types)]
pub enum ChatHistorySubCommand {
    /// `BEFORE <target> <msgref> <limit>`
    BEFORE,
    /// `AFTER <target> <msgref> <limit>`
    AFTER,
    /// `LATEST <target> <msgref|*> <limit>`
    LATEST,
    /// `AROUND <target> <msgref> <limit>`
    AROUND,
    /// `BETWEEN <target> <msgref> <msgref> <limit>`
    BETWEEN,
    /// `TARGETS <timestamp> <timestamp> <limit>`
    TARGETS,
}

impl fmt::Display for ChatHistorySubCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BEFORE => "BEFORE",
            Self::AFTER => "AFTER",
            Self::LATEST => "LATEST",
            Self::AROUND => "AROUND",
            Self::BETWEEN => "BETWEEN",
            Self::TARGETS => "TARGETS",
        };
        f.write_str(s)
    }
}

impl FromStr for ChatHistorySubCommand {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BEFORE" => Ok(Self::BEFORE),
            "AFTER" => Ok(Self::AFTER),
            "LATEST" => Ok(Self::LATEST),
            "AROUND" => Ok(Self::AROUND),
            "BETWEEN" => Ok(Self::BETWEEN),
            "TARGETS" => Ok(Self::TARGETS),
            other => Err(MessageParseError::InvalidSubcommand {
                cmd: "CHATHISTORY",
                sub: other.to_owned(),
            }),
        }
    }
}

/// A single message reference: either an opaque `msgid`, a server-time
/// timestamp, or the literal `*` sentinel ("the start/end of history").
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageReference {
    /// `msgid=<id>`
    MsgId(String),
    /// `timestamp=<server-time>`
    Timestamp(String),
    /// `*` — open-ended reference (start/end of available history).
    Star,
}

impl fmt::Display for MessageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MsgId(id) => write!(f, "msgid={}", id),
            Self::Timestamp(ts) => write!(f, "timestamp={}", ts),
            Self::Star => f.write_str("*"),
        }
    }
}

impl FromStr for MessageReference {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" {
            Ok(Self::Star)
        } else if let Some(id) = s.strip_prefix("msgid=") {
            Ok(Self::MsgId(id.to_owned()))
        } else if let Some(ts) = s.strip_prefix("timestamp=") {
            Ok(Self::Timestamp(ts.to_owned()))
        } else {
            Err(MessageParseError::InvalidArgument(format!(
                "invalid CHATHISTORY message reference: {}",
                s
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands_case_insensitively() {
        assert_eq!(
            "before".parse::<ChatHistorySubCommand>().unwrap(),
            ChatHistorySubCommand::BEFORE
        );
    }

    #[test]
    fn message_reference_roundtrip() {
        let r: MessageReference = "msgid=abc123".parse().unwrap();
        assert_eq!(r, MessageReference::MsgId("abc123".to_owned()));
        assert_eq!(r.to_string(), "msgid=abc123");

        assert_eq!("*".parse::<MessageReference>().unwrap(), MessageReference::Star);
    }

    #[test]
    fn rejects_malformed_reference() {
        assert!("bogus".parse::<MessageReference>().is_err());
    }
}
