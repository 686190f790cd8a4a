//! `CAP` subcommand (IRCv3 capability negotiation).

use std::fmt;
use std::str::FromStr;

use crate::error::MessageParseError;

/// The subcommand token of a `CAP` message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum CapSubCommand {
    /// `LS` — list capabilities the server supports.
    LS,
    /// `LIST` — list capabilities currently enabled.
    LIST,
    /// `REQ` — request capabilities be enabled.
    REQ,
    /// `ACK` — server acknowledges a `REQ`.
    ACK,
    /// `NAK` — server rejects a `REQ`.
    NAK,
    /// `END` — end capability negotiation.
    END,
    /// `NEW` — server announces newly available capabilities (cap-notify).
    NEW,
    /// `DEL` — server announces capabilities no longer available.
    DEL,
}

impl CapSubCommand {
    /// The wire representation of this subcommand.
    #[must_use]
    pub fn to_str(self) -> &'static str {
        match self {
            Self::LS => "LS",
            Self::LIST => "LIST",
            Self::REQ => "REQ",
            Self::ACK => "ACK",
            Self::NAK => "NAK",
            Self::END => "END",
            Self::NEW => "NEW",
            Self::DEL => "DEL",
        }
    }
}

impl fmt::Display for CapSubCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl FromStr for CapSubCommand {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LS" => Ok(Self::LS),
            "LIST" => Ok(Self::LIST),
            "REQ" => Ok(Self::REQ),
            "ACK" => Ok(Self::ACK),
            "NAK" => Ok(Self::NAK),
            "END" => Ok(Self::END),
            "NEW" => Ok(Self::NEW),
            "DEL" => Ok(Self::DEL),
            other => Err(MessageParseError::InvalidSubcommand {
                cmd: "CAP",
                sub: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("req".parse::<CapSubCommand>().unwrap(), CapSubCommand::REQ);
        assert_eq!("ACK".parse::<CapSubCommand>().unwrap(), CapSubCommand::ACK);
    }

    #[test]
    fn rejects_unknown() {
        assert!("BOGUS".parse::<CapSubCommand>().is_err());
    }

    #[test]
    fn display_matches_wire_form() {
        assert_eq!(CapSubCommand::LS.to_string(), "LS");
    }
}
