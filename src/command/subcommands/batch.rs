//! `BATCH` subcommand/type token (IRCv3 `batch` and `draft/multiline`).

use std::fmt;
use std::str::FromStr;

use crate::error::MessageParseError;

/// The batch-type token following the reference tag in a `BATCH +ref type`
/// message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum BatchSubCommand {
    /// `netsplit` — a batch of QUITs caused by a server split.
    NetSplit,
    /// `netjoin` — a batch of JOINs caused by a server rejoin.
    NetJoin,
    /// `chathistory` — a batch of historical messages.
    ChatHistory,
    /// `draft/multiline` — a multi-line PRIVMSG/NOTICE split across lines.
    Multiline,
    /// Any other/custom batch type.
    Custom(String),
}

impl BatchSubCommand {
    /// The wire representation of this batch type.
    #[must_use]
    pub fn to_str(&self) -> &str {
        match self {
            Self::NetSplit => "netsplit",
            Self::NetJoin => "netjoin",
            Self::ChatHistory => "chathistory",
            Self::Multiline => "draft/multiline",
            Self::Custom(s) => s,
        }
    }
}

impl fmt::Display for BatchSubCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl FromStr for BatchSubCommand {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "netsplit" => Self::NetSplit,
            "netjoin" => Self::NetJoin,
            "chathistory" => Self::ChatHistory,
            "draft/multiline" => Self::Multiline,
            other => Self::Custom(other.to_owned()),
        })
    }
}
