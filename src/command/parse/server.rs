use super::super::types::Command;
use super::connection::raw;
use crate::error::MessageParseError;

pub(super) fn parse(cmd: &str, args: Vec<&str>) -> Result<Command, MessageParseError> {
    let result = match cmd {
        "MOTD" => {
            if args.is_empty() {
                Command::MOTD(None)
            } else if args.len() == 1 {
                Command::MOTD(Some(args[0].to_owned()))
            } else {
                raw(cmd, args)
            }
        }
        "LUSERS" => {
            if args.is_empty() {
                Command::LUSERS(None, None)
            } else if args.len() == 1 {
                Command::LUSERS(Some(args[0].to_owned()), None)
            } else if args.len() == 2 {
                Command::LUSERS(Some(args[0].to_owned()), Some(args[1].to_owned()))
            } else {
                raw(cmd, args)
            }
        }
        "VERSION" => {
            if args.is_empty() {
                Command::VERSION(None)
            } else if args.len() == 1 {
                Command::VERSION(Some(args[0].to_owned()))
            } else {
                raw(cmd, args)
            }
        }
        "STATS" => {
            if args.is_empty() {
                Command::STATS(None, None)
            } else if args.len() == 1 {
                Command::STATS(Some(args[0].to_owned()), None)
            } else if args.len() == 2 {
                Command::STATS(Some(args[0].to_owned()), Some(args[1].to_owned()))
            } else {
                raw(cmd, args)
            }
        }
        "LINKS" => {
            if args.is_empty() {
                Command::LINKS(None, None)
            } else if args.len() == 1 {
                Command::LINKS(Some(args[0].to_owned()), None)
            } else if args.len() == 2 {
                Command::LINKS(Some(args[0].to_owned()), Some(args[1].to_owned()))
            } else {
                raw(cmd, args)
            }
        }
        "TIME" => {
            if args.is_empty() {
                Command::TIME(None)
            } else if args.len() == 1 {
                Command::TIME(Some(args[0].to_owned()))
            } else {
                raw(cmd, args)
            }
        }
        "CONNECT" => {
            if args.len() != 2 {
                raw(cmd, args)
            } else {
                Command::CONNECT(args[0].to_owned(), args[1].to_owned(), None)
            }
        }
        "TRACE" => {
            if args.is_empty() {
                Command::TRACE(None)
            } else if args.len() == 1 {
                Command::TRACE(Some(args[0].to_owned()))
            } else {
                raw(cmd, args)
            }
        }
        "ADMIN" => {
            if args.is_empty() {
                Command::ADMIN(None)
            } else if args.len() == 1 {
                Command::ADMIN(Some(args[0].to_owned()))
            } else {
                raw(cmd, args)
            }
        }
        "INFO" => {
            if args.is_empty() {
                Command::INFO(None)
            } else if args.len() == 1 {
                Command::INFO(Some(args[0].to_owned()))
            } else {
                raw(cmd, args)
            }
        }
        "MAP" => {
            if args.is_empty() {
                Command::MAP
            } else {
                raw(cmd, args)
            }
        }
        "RULES" => {
            if args.is_empty() {
                Command::RULES
            } else {
                raw(cmd, args)
            }
        }
        "USERIP" => Command::USERIP(args.into_iter().map(|s| s.to_owned()).collect()),
        "SERVLIST" => {
            if args.is_empty() {
                Command::SERVLIST(None, None)
            } else if args.len() == 1 {
                Command::SERVLIST(Some(args[0].to_owned()), None)
            } else if args.len() == 2 {
                Command::SERVLIST(Some(args[0].to_owned()), Some(args[1].to_owned()))
            } else {
                raw(cmd, args)
            }
        }
        "SQUERY" => {
            if args.len() != 2 {
                raw(cmd, args)
            } else {
                Command::SQUERY(args[0].to_owned(), args[1].to_owned())
            }
        }

        "KLINE" => match args.as_slice() {
            [time, mask, reason] => {
                Command::KLINE(Some((*time).to_owned()), (*mask).to_owned(), (*reason).to_owned())
            }
            [mask, reason] => Command::KLINE(None, (*mask).to_owned(), (*reason).to_owned()),
            _ => raw(cmd, args),
        },
        "DLINE" => match args.as_slice() {
            [time, host, reason] => {
                Command::DLINE(Some((*time).to_owned()), (*host).to_owned(), (*reason).to_owned())
            }
            [host, reason] => Command::DLINE(None, (*host).to_owned(), (*reason).to_owned()),
            _ => raw(cmd, args),
        },
        "UNKLINE" => {
            if args.len() != 1 {
                raw(cmd, args)
            } else {
                Command::UNKLINE(args[0].to_owned())
            }
        }
        "UNDLINE" => {
            if args.len() != 1 {
                raw(cmd, args)
            } else {
                Command::UNDLINE(args[0].to_owned())
            }
        }
        "GLINE" => match args.as_slice() {
            [mask, reason] => Command::GLINE((*mask).to_owned(), Some((*reason).to_owned())),
            [mask] => Command::GLINE((*mask).to_owned(), None),
            _ => raw(cmd, args),
        },
        "UNGLINE" => {
            if args.len() != 1 {
                raw(cmd, args)
            } else {
                Command::UNGLINE(args[0].to_owned())
            }
        }
        "ZLINE" => match args.as_slice() {
            [ip, reason] => Command::ZLINE((*ip).to_owned(), Some((*reason).to_owned())),
            [ip] => Command::ZLINE((*ip).to_owned(), None),
            _ => raw(cmd, args),
        },
        "UNZLINE" => {
            if args.len() != 1 {
                raw(cmd, args)
            } else {
                Command::UNZLINE(args[0].to_owned())
            }
        }
        "RLINE" => match args.as_slice() {
            [pattern, reason] => Command::RLINE((*pattern).to_owned(), Some((*reason).to_owned())),
            [pattern] => Command::RLINE((*pattern).to_owned(), None),
            _ => raw(cmd, args),
        },
        "UNRLINE" => {
            if args.len() != 1 {
                raw(cmd, args)
            } else {
                Command::UNRLINE(args[0].to_owned())
            }
        }
        "SHUN" => match args.as_slice() {
            [mask, reason] => Command::SHUN((*mask).to_owned(), Some((*reason).to_owned())),
            [mask] => Command::SHUN((*mask).to_owned(), None),
            _ => raw(cmd, args),
        },
        "UNSHUN" => {
            if args.len() != 1 {
                raw(cmd, args)
            } else {
                Command::UNSHUN(args[0].to_owned())
            }
        }
        "KNOCK" => match args.as_slice() {
            [chan, msg] => Command::KNOCK((*chan).to_owned(), Some((*msg).to_owned())),
            [chan] => Command::KNOCK((*chan).to_owned(), None),
            _ => raw(cmd, args),
        },

        _ => unreachable!("server::parse called with non-server command: {}", cmd),
    };

    Ok(result)
}
