//! Generic wire-level command value (spec.md §3 "Command") and the
//! command factory that validates and constructs it (spec.md §4.3).
//!
//! This is distinct from [`crate::command::Command`] (the typed, per-verb
//! convenience enum built for ergonomic message construction): the
//! session/dispatcher machinery needs one uniform, direction-tagged value
//! that covers client-to-server, server-to-client, and intra-process bot
//! commands alike, with the length/character-class validation the wire
//! protocol demands baked into construction rather than left to the
//! caller.

use std::fmt::Write as _;

use crate::error::SessionError;
use crate::linebreak::{self, LineBreakOptions};
use crate::message::tags::escape_tag_value;
use crate::message::Tag;
use crate::prefix::Prefix;

/// Which direction a [`CommandRecord`] flows (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Outbound, client to server.
    ClientToServer,
    /// Inbound, server to client.
    ServerToClient,
    /// Synthetic, produced and consumed entirely within this process (e.g.
    /// a hook-injected pseudo-command).
    Bot,
}

/// An immutable, validated IRC command value.
///
/// Construction is the only place validation happens; once built, a
/// `CommandRecord` is guaranteed to satisfy spec.md §3's invariants (arg
/// shape, verb shape, tag-key shape, length budgets).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandRecord {
    source: Option<Prefix>,
    verb: String,
    args: Vec<String>,
    tags: Vec<Tag>,
    has_trailing: bool,
    direction: Direction,
}

impl CommandRecord {
    /// The message source, if any.
    #[must_use]
    pub fn source(&self) -> Option<&Prefix> {
        self.source.as_ref()
    }

    /// The uppercased verb (IRC command name or three-digit numeric).
    #[must_use]
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// The ordered argument list.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The message tags.
    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Whether the last argument was marked as a trailing (`:`-prefixed)
    /// parameter at construction time.
    #[must_use]
    pub fn has_trailing(&self) -> bool {
        self.has_trailing
    }

    /// This command's direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Render the tag portion (`key=value;key2=value2`, no leading `@` or
    /// trailing space), or `None` if there are no tags.
    #[must_use]
    pub fn tag_part(&self) -> Option<String> {
        if self.tags.is_empty() {
            return None;
        }
        let mut out = String::new();
        for (i, tag) in self.tags.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            out.push_str(&tag.0);
            if let Some(value) = &tag.1 {
                out.push('=');
                // `escape_tag_value` writes through `fmt::Write`; String
                // implements it, so errors are infallible here.
                let _ = escape_tag_value(&mut out, value);
            }
        }
        Some(out)
    }

    /// Render the command portion (source, verb, args), without tags and
    /// without a trailing CRLF.
    #[must_use]
    pub fn command_part(&self) -> String {
        let mut out = String::new();
        if let Some(source) = &self.source {
            let _ = write!(out, ":{source} ");
        }
        out.push_str(&self.verb);
        for (i, arg) in self.args.iter().enumerate() {
            out.push(' ');
            let is_last = i == self.args.len() - 1;
            if is_last && (self.has_trailing || arg.is_empty() || arg.contains(' ') || arg.starts_with(':')) {
                out.push(':');
            }
            out.push_str(arg);
        }
        out
    }

    /// The complete wire form (tags + source + verb + args), without CRLF.
    #[must_use]
    pub fn full_command(&self) -> String {
        match self.tag_part() {
            Some(tags) => format!("@{tags} {}", self.command_part()),
            None => self.command_part(),
        }
    }
}

/// Length budgets enforced at construction (spec.md §4.1/§4.3).
#[derive(Clone, Copy, Debug)]
pub struct FactoryOptions {
    /// Maximum bytes for the command line including the trailing CRLF.
    /// RFC floor: 512.
    pub line_len: usize,
    /// Maximum bytes for the client-originated tag section. RFC floor: 4096.
    pub client_tag_len: usize,
    /// Maximum bytes for the server-originated tag section. RFC floor: 8191.
    pub server_tag_len: usize,
    /// Whether the server has advertised `draft/multiline`.
    pub multiline_supported: bool,
    /// `draft/multiline`'s advertised `max-bytes` value, if any.
    pub multiline_max_bytes: Option<usize>,
    /// `draft/multiline`'s advertised `max-lines` value, if any.
    pub multiline_max_lines: Option<usize>,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            line_len: 512,
            client_tag_len: 4096,
            server_tag_len: 8191,
            multiline_supported: false,
            multiline_max_bytes: None,
            multiline_max_lines: None,
        }
    }
}

/// `PRIVMSG` or `NOTICE`, for [`CommandFactory::prepare_client_message`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// `PRIVMSG`.
    Privmsg,
    /// `NOTICE`.
    Notice,
}

impl MessageKind {
    fn verb(self, cprivmsg: bool) -> &'static str {
        match (self, cprivmsg) {
            (Self::Privmsg, false) => "PRIVMSG",
            (Self::Privmsg, true) => "CPRIVMSG",
            (Self::Notice, false) => "NOTICE",
            (Self::Notice, true) => "CNOTICE",
        }
    }
}

/// Validates and constructs [`CommandRecord`]s (spec.md §4.3).
pub struct CommandFactory;

impl CommandFactory {
    /// Validate and construct a single command.
    ///
    /// `source` is only meaningful for server-to-client/bot commands;
    /// client-to-server commands are always sent without an explicit
    /// source (the server supplies one).
    pub fn prepare_client_command(
        verb: &str,
        args: Vec<String>,
        tags: Vec<Tag>,
        options: &FactoryOptions,
    ) -> Result<CommandRecord, SessionError> {
        Self::prepare(None, verb, args, tags, Direction::ClientToServer, options)
    }

    /// Validate and construct a command with an explicit source and
    /// direction (used for server-to-client and intra-process bot
    /// commands).
    pub fn prepare_with_source(
        source: Option<Prefix>,
        verb: &str,
        args: Vec<String>,
        tags: Vec<Tag>,
        direction: Direction,
        options: &FactoryOptions,
    ) -> Result<CommandRecord, SessionError> {
        Self::prepare(source, verb, args, tags, direction, options)
    }

    fn prepare(
        source: Option<Prefix>,
        verb: &str,
        args: Vec<String>,
        tags: Vec<Tag>,
        direction: Direction,
        options: &FactoryOptions,
    ) -> Result<CommandRecord, SessionError> {
        validate_verb(verb, direction)?;
        for (i, arg) in args.iter().enumerate() {
            let is_last = i == args.len() - 1;
            validate_arg(arg, is_last)?;
        }
        for tag in &tags {
            validate_tag_key(&tag.0)?;
            if let Some(value) = &tag.1 {
                if value.contains('\0') {
                    return Err(SessionError::InvalidArgument(format!(
                        "tag {} value contains NUL",
                        tag.0
                    )));
                }
            }
        }

        let has_trailing = args
            .last()
            .is_some_and(|a| a.is_empty() || a.contains(' ') || a.starts_with(':'));

        let record = CommandRecord {
            source,
            verb: verb.to_ascii_uppercase(),
            args,
            tags,
            has_trailing,
            direction,
        };

        let tag_budget = match direction {
            Direction::ServerToClient => options.server_tag_len,
            _ => options.client_tag_len,
        };
        if let Some(tag_part) = record.tag_part() {
            if tag_part.len() > tag_budget {
                return Err(SessionError::CommandTooLong(format!(
                    "tags: {} bytes > {} byte limit",
                    tag_part.len(),
                    tag_budget
                )));
            }
        }

        // `full_command` excludes the trailing CRLF; the line budget
        // includes it, so the content-only ceiling is `line_len - 2`.
        let content_len = record.command_part().len();
        if content_len > options.line_len.saturating_sub(2) {
            return Err(SessionError::CommandTooLong(format!(
                "command: {} bytes > {} byte limit",
                content_len,
                options.line_len - 2
            )));
        }

        Ok(record)
    }

    /// Build one or more `PRIVMSG`/`NOTICE` commands carrying `text`,
    /// splitting it across protocol-legal lines with the line-break
    /// splitter (spec.md §4.2) and, when the server advertises
    /// `draft/multiline` and the split produced more than one line,
    /// wrapping the result in a `draft/multiline` `BATCH` (spec.md §4.3).
    ///
    /// `self_ident_len` is the byte length of this client's own
    /// `nick!user@host` mask as it will appear as the message source once
    /// echoed by the server — the factor that, together with verb and
    /// target length, determines how much of the 512-byte line budget is
    /// left for message text.
    pub fn prepare_client_message(
        self_ident_len: usize,
        kind: MessageKind,
        target: &str,
        text: &str,
        tags: Vec<Tag>,
        shared_channel: Option<&str>,
        options: &FactoryOptions,
    ) -> Result<Vec<CommandRecord>, SessionError> {
        let cprivmsg = shared_channel.is_some();
        let verb = kind.verb(cprivmsg);

        let mut budget = options
            .line_len
            .saturating_sub(21)
            .saturating_sub(self_ident_len)
            .saturating_sub(verb.len())
            .saturating_sub(target.len());
        if let Some(channel) = shared_channel {
            budget = budget.saturating_sub(1 + channel.len());
        }
        if budget < 22 {
            return Err(SessionError::InvalidArgument(
                "no room left for message text under the configured line length".to_owned(),
            ));
        }

        let lb_options = LineBreakOptions {
            max_bytes: budget,
            ..Default::default()
        };
        let lines: Vec<String> = linebreak::split(text, &lb_options)
            .into_iter()
            .map(|l| l.text)
            .collect();
        let lines = if lines.is_empty() {
            vec![String::new()]
        } else {
            lines
        };

        let build_args = |line: String| -> Vec<String> {
            let mut args = vec![target.to_owned()];
            if let Some(channel) = shared_channel {
                args.push(channel.to_owned());
            }
            args.push(line);
            args
        };

        if lines.len() == 1 || !options.multiline_supported {
            return lines
                .into_iter()
                .map(|line| {
                    Self::prepare_client_command(verb, build_args(line), tags.clone(), options)
                })
                .collect();
        }

        if let Some(max_lines) = options.multiline_max_lines {
            if lines.len() > max_lines {
                return Err(SessionError::InvalidArgument(format!(
                    "message needs {} lines, exceeds draft/multiline max-lines={}",
                    lines.len(),
                    max_lines
                )));
            }
        }
        if let Some(max_bytes) = options.multiline_max_bytes {
            let total: usize = lines.iter().map(|l| l.len()).sum();
            if total > max_bytes {
                return Err(SessionError::InvalidArgument(format!(
                    "message needs {total} bytes, exceeds draft/multiline max-bytes={max_bytes}"
                )));
            }
        }

        let batch_ref = crate::generate_batch_ref();
        let mut out = Vec::with_capacity(lines.len() + 2);

        let mut open_tags = tags.clone();
        open_tags.push(Tag("batch".to_owned(), None));
        let batch_type = if matches!(kind, MessageKind::Privmsg) {
            "draft/multiline,PRIVMSG"
        } else {
            "draft/multiline,NOTICE"
        };
        out.push(Self::prepare_client_command(
            "BATCH",
            vec![format!("+{batch_ref}"), batch_type.to_owned(), target.to_owned()],
            Vec::new(),
            options,
        )?);

        for (i, line) in lines.into_iter().enumerate() {
            let mut line_tags = Vec::with_capacity(2);
            line_tags.push(Tag("batch".to_owned(), Some(batch_ref.clone())));
            if i > 0 {
                line_tags.push(Tag("draft/multiline-concat".to_owned(), None));
            }
            out.push(Self::prepare_client_command(
                verb,
                build_args(line),
                line_tags,
                options,
            )?);
        }

        out.push(Self::prepare_client_command(
            "BATCH",
            vec![format!("-{batch_ref}")],
            Vec::new(),
            options,
        )?);

        Ok(out)
    }
}

fn validate_verb(verb: &str, direction: Direction) -> Result<(), SessionError> {
    if verb.is_empty() {
        return Err(SessionError::InvalidArgument("empty verb".to_owned()));
    }
    let ok = match direction {
        Direction::Bot => verb.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
        Direction::ClientToServer | Direction::ServerToClient => {
            verb.chars().all(|c| c.is_ascii_alphabetic())
                || (verb.len() == 3 && verb.chars().all(|c| c.is_ascii_digit()))
        }
    };
    if ok {
        Ok(())
    } else {
        Err(SessionError::InvalidArgument(format!("invalid verb: {verb}")))
    }
}

fn validate_arg(arg: &str, is_last: bool) -> Result<(), SessionError> {
    if arg.contains('\0') || arg.contains('\r') || arg.contains('\n') {
        return Err(SessionError::InvalidArgument(
            "argument contains NUL/CR/LF".to_owned(),
        ));
    }
    if !is_last {
        if arg.is_empty() {
            return Err(SessionError::InvalidArgument(
                "non-trailing argument is empty".to_owned(),
            ));
        }
        if arg.contains(' ') {
            return Err(SessionError::InvalidArgument(
                "non-trailing argument contains a space".to_owned(),
            ));
        }
        if arg.starts_with(':') {
            return Err(SessionError::InvalidArgument(
                "non-trailing argument starts with ':'".to_owned(),
            ));
        }
    }
    Ok(())
}

fn validate_tag_key(key: &str) -> Result<(), SessionError> {
    let mut rest = key;
    if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    }
    if let Some(slash) = rest.find('/') {
        let vendor = &rest[..slash];
        if vendor.is_empty()
            || !vendor
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(SessionError::InvalidArgument(format!(
                "invalid tag vendor: {key}"
            )));
        }
        rest = &rest[slash + 1..];
    }
    if rest.is_empty()
        || !rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(SessionError::InvalidArgument(format!(
            "invalid tag key: {key}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> FactoryOptions {
        FactoryOptions::default()
    }

    #[test]
    fn prepares_simple_command() {
        let cmd = CommandFactory::prepare_client_command(
            "privmsg",
            vec!["#chan".to_owned(), "hi".to_owned()],
            Vec::new(),
            &opts(),
        )
        .unwrap();
        assert_eq!(cmd.verb(), "PRIVMSG");
        assert_eq!(cmd.full_command(), "PRIVMSG #chan hi");
    }

    #[test]
    fn trailing_colon_applied_when_last_arg_has_space() {
        let cmd = CommandFactory::prepare_client_command(
            "PRIVMSG",
            vec!["#chan".to_owned(), "hello world".to_owned()],
            Vec::new(),
            &opts(),
        )
        .unwrap();
        assert_eq!(cmd.full_command(), "PRIVMSG #chan :hello world");
    }

    #[test]
    fn rejects_non_trailing_empty_arg() {
        let err = CommandFactory::prepare_client_command(
            "PRIVMSG",
            vec![String::new(), "hi".to_owned()],
            Vec::new(),
            &opts(),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_numeric_verb_with_wrong_length() {
        let err = CommandFactory::prepare_client_command("12", vec![], Vec::new(), &opts())
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_command_too_long() {
        let long_arg = "x".repeat(600);
        let err = CommandFactory::prepare_client_command(
            "PRIVMSG",
            vec!["#chan".to_owned(), long_arg],
            Vec::new(),
            &opts(),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::CommandTooLong(_)));
    }

    #[test]
    fn tag_escaping_round_trips_through_tag_part() {
        let tags = vec![Tag("foo".to_owned(), Some("a;b c\\d".to_owned()))];
        let cmd = CommandFactory::prepare_client_command(
            "PRIVMSG",
            vec!["#chan".to_owned(), "hi".to_owned()],
            tags,
            &opts(),
        )
        .unwrap();
        assert_eq!(cmd.tag_part().unwrap(), "foo=a\\:b\\sc\\\\d");
        assert_eq!(cmd.full_command(), "@foo=a\\:b\\sc\\\\d PRIVMSG #chan hi");
    }

    #[test]
    fn splits_long_message_across_multiple_lines() {
        let text = "a".repeat(100);
        let lines = CommandFactory::prepare_client_message(
            9,
            MessageKind::Privmsg,
            "#chan",
            &text,
            Vec::new(),
            None,
            &FactoryOptions {
                line_len: 60,
                ..opts()
            },
        )
        .unwrap();
        assert!(lines.len() > 1);
        for line in &lines {
            assert_eq!(line.verb(), "PRIVMSG");
        }
    }

    #[test]
    fn wraps_multiline_in_batch_when_advertised() {
        let text = "a".repeat(100);
        let cmds = CommandFactory::prepare_client_message(
            9,
            MessageKind::Privmsg,
            "#chan",
            &text,
            Vec::new(),
            None,
            &FactoryOptions {
                line_len: 60,
                multiline_supported: true,
                ..opts()
            },
        )
        .unwrap();
        assert_eq!(cmds.first().unwrap().verb(), "BATCH");
        assert_eq!(cmds.last().unwrap().verb(), "BATCH");
        assert!(cmds[1..cmds.len() - 1]
            .iter()
            .all(|c| c.verb() == "PRIVMSG"));
    }
}
