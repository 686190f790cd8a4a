use crate::error::MessageParseError;
use super::super::types::Command;
use super::connection::raw;

pub(super) fn parse(cmd: &str, args: Vec<&str>) -> Result<Command, MessageParseError> {
    let result = match cmd {
        "WHO" => match args.as_slice() {
            [] => Command::WHO(None, None),
            [mask] => Command::WHO(Some((*mask).to_owned()), None),
            [mask, flag] => Command::WHO(Some((*mask).to_owned()), Some(*flag == "o")),
            _ => raw(cmd, args),
        },
        "WHOIS" => match args.as_slice() {
            [nickmasks] => Command::WHOIS(None, (*nickmasks).to_owned()),
            [target, nickmasks] => {
                Command::WHOIS(Some((*target).to_owned()), (*nickmasks).to_owned())
            }
            _ => raw(cmd, args),
        },
        "WHOWAS" => match args.as_slice() {
            [nick] => Command::WHOWAS((*nick).to_owned(), None, None),
            [nick, count] => Command::WHOWAS((*nick).to_owned(), Some((*count).to_owned()), None),
            [nick, count, target] => Command::WHOWAS(
                (*nick).to_owned(),
                Some((*count).to_owned()),
                Some((*target).to_owned()),
            ),
            _ => raw(cmd, args),
        },
        _ => unreachable!("user::parse called with non-user command: {}", cmd),
    };

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::super::super::types::Command;

    #[test]
    fn parses_who_with_operator_flag() {
        let cmd = Command::new("WHO", vec!["#chan", "o"]).unwrap();
        assert_eq!(cmd, Command::WHO(Some("#chan".to_owned()), Some(true)));
    }

    #[test]
    fn parses_whois_with_target() {
        let cmd = Command::new("WHOIS", vec!["server", "nick"]).unwrap();
        assert_eq!(
            cmd,
            Command::WHOIS(Some("server".to_owned()), "nick".to_owned())
        );
    }

    #[test]
    fn parses_whowas_bare() {
        let cmd = Command::new("WHOWAS", vec!["nick"]).unwrap();
        assert_eq!(cmd, Command::WHOWAS("nick".to_owned(), None, None));
    }
}
