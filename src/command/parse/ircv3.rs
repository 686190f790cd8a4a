use super::super::subcommands::{ChatHistorySubCommand, MessageReference};
use super::super::types::Command;
use super::connection::raw;
use crate::error::MessageParseError;

pub(super) fn parse(cmd: &str, args: Vec<&str>) -> Result<Command, MessageParseError> {
    let result = match cmd {
        "CAP" => {
            if args.len() == 1 {
                match args[0].parse() {
                    Ok(c) => Command::CAP(None, c, None, None),
                    Err(_) => raw(cmd, args),
                }
            } else if args.len() == 2 {
                match args[0].parse() {
                    Ok(c) => Command::CAP(None, c, Some(args[1].to_owned()), None),
                    Err(_) => raw(cmd, args),
                }
            } else if args.len() == 3 {
                if let Ok(cmd_parsed) = args[1].parse() {
                    Command::CAP(
                        Some(args[0].to_owned()),
                        cmd_parsed,
                        Some(args[2].to_owned()),
                        None,
                    )
                } else {
                    raw(cmd, args)
                }
            } else if args.len() == 4 {
                if let Ok(cmd_parsed) = args[1].parse() {
                    Command::CAP(
                        Some(args[0].to_owned()),
                        cmd_parsed,
                        Some(args[2].to_owned()),
                        Some(args[3].to_owned()),
                    )
                } else {
                    raw(cmd, args)
                }
            } else {
                raw(cmd, args)
            }
        }
        "AUTHENTICATE" => {
            if args.len() == 1 {
                Command::AUTHENTICATE(args[0].to_owned())
            } else {
                raw(cmd, args)
            }
        }
        "ACCOUNT" => {
            if args.len() == 1 {
                Command::ACCOUNT(args[0].to_owned())
            } else {
                raw(cmd, args)
            }
        }
        "MONITOR" => {
            if args.len() == 2 {
                Command::MONITOR(args[0].to_owned(), Some(args[1].to_owned()))
            } else if args.len() == 1 {
                Command::MONITOR(args[0].to_owned(), None)
            } else {
                raw(cmd, args)
            }
        }
        "BATCH" => {
            if args.len() == 1 {
                Command::BATCH(args[0].to_owned(), None, None)
            } else if args.len() == 2 {
                match args[1].parse() {
                    Ok(sub) => Command::BATCH(args[0].to_owned(), Some(sub), None),
                    Err(_) => raw(cmd, args),
                }
            } else if args.len() > 2 {
                match args[1].parse() {
                    Ok(sub) => Command::BATCH(
                        args[0].to_owned(),
                        Some(sub),
                        Some(args.iter().skip(2).map(|s| s.to_string()).collect()),
                    ),
                    Err(_) => raw(cmd, args),
                }
            } else {
                raw(cmd, args)
            }
        }
        "CHGHOST" => {
            if args.len() == 2 {
                Command::CHGHOST(args[0].to_owned(), args[1].to_owned())
            } else {
                raw(cmd, args)
            }
        }
        "SETNAME" => {
            if args.len() == 1 {
                Command::SETNAME(args[0].to_owned())
            } else {
                raw(cmd, args)
            }
        }
        "TAGMSG" => {
            if args.len() == 1 {
                Command::TAGMSG(args[0].to_owned())
            } else {
                raw(cmd, args)
            }
        }
        "ACK" => {
            if args.is_empty() {
                Command::ACK
            } else {
                raw(cmd, args)
            }
        }
        "WEBIRC" => match args.as_slice() {
            [pass, gateway, host, ip] => Command::WEBIRC(
                (*pass).to_owned(),
                (*gateway).to_owned(),
                (*host).to_owned(),
                (*ip).to_owned(),
                None,
            ),
            [pass, gateway, host, ip, opts] => Command::WEBIRC(
                (*pass).to_owned(),
                (*gateway).to_owned(),
                (*host).to_owned(),
                (*ip).to_owned(),
                Some((*opts).to_owned()),
            ),
            _ => raw(cmd, args),
        },
        "FAIL" => parse_standard_reply(cmd, args, Command::FAIL),
        "WARN" => parse_standard_reply(cmd, args, Command::WARN),
        "NOTE" => parse_standard_reply(cmd, args, Command::NOTE),
        "CHATHISTORY" => parse_chathistory(cmd, args),
        _ => unreachable!("ircv3::parse called with non-ircv3 command: {}", cmd),
    };

    Ok(result)
}

/// Shared parser for the `FAIL`/`WARN`/`NOTE` standard-reply commands:
/// `<type> command code [context...] :description`.
fn parse_standard_reply(
    cmd: &str,
    args: Vec<&str>,
    make: fn(String, String, Vec<String>) -> Command,
) -> Command {
    if args.len() < 2 {
        return raw(cmd, args);
    }
    let command = args[0].to_owned();
    let code = args[1].to_owned();
    let context = args[2..].iter().map(|s| (*s).to_owned()).collect();
    make(command, code, context)
}

/// Parser for `CHATHISTORY subcommand target/params...`.
fn parse_chathistory(cmd: &str, args: Vec<&str>) -> Command {
    let subcommand = match args.first().and_then(|s| s.parse::<ChatHistorySubCommand>().ok()) {
        Some(sub) => sub,
        None => return raw(cmd, args),
    };

    let parsed = match subcommand {
        ChatHistorySubCommand::TARGETS if args.len() == 4 => {
            match (args[1].parse::<MessageReference>(), args[2].parse::<MessageReference>(), args[3].parse::<u32>()) {
                (Ok(r1), Ok(r2), Ok(limit)) => Some(Command::CHATHISTORY {
                    subcommand,
                    target: "*".to_owned(),
                    msg_ref1: r1,
                    msg_ref2: Some(r2),
                    limit,
                }),
                _ => None,
            }
        }
        ChatHistorySubCommand::BETWEEN if args.len() == 5 => {
            match (args[2].parse::<MessageReference>(), args[3].parse::<MessageReference>(), args[4].parse::<u32>()) {
                (Ok(r1), Ok(r2), Ok(limit)) => Some(Command::CHATHISTORY {
                    subcommand,
                    target: args[1].to_owned(),
                    msg_ref1: r1,
                    msg_ref2: Some(r2),
                    limit,
                }),
                _ => None,
            }
        }
        ChatHistorySubCommand::TARGETS | ChatHistorySubCommand::BETWEEN => None,
        _ if args.len() == 4 => match (args[2].parse::<MessageReference>(), args[3].parse::<u32>()) {
            (Ok(r1), Ok(limit)) => Some(Command::CHATHISTORY {
                subcommand,
                target: args[1].to_owned(),
                msg_ref1: r1,
                msg_ref2: None,
                limit,
            }),
            _ => None,
        },
        _ => None,
    };

    match parsed {
        Some(command) => command,
        None => raw(cmd, args),
    }
}
