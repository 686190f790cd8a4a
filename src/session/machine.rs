//! Sans-IO session state machine (spec.md §4.6): CAP negotiation, SASL,
//! registration and nick retry. `feed` takes one inbound [`Message`] and
//! returns the [`Action`]s the driver should perform — it never touches a
//! socket itself. `Joining`/`Ready`/`Quitting` are driven directly by
//! `session::driver` (parallel per-channel joins don't fit this single
//! linear feed loop), so this machine only owns the first four states and
//! hands off at `Registering -> Joining`.

use std::collections::HashMap;

use crate::command::record::{CommandFactory, CommandRecord, FactoryOptions};
use crate::error::SessionError;
use crate::message::Message;
use crate::netstate::NetworkInfo;
use crate::response::Response;
use crate::sasl::scram::ChannelBinding;
use crate::sasl::{MechanismContext, SaslMechanism};
use crate::session::sasl_driver::{chunk_authenticate_payload, SaslRun, SaslStep};
use crate::Command;

/// The eight lifecycle states of spec.md §4.6. `Joining`, `Ready` and
/// `Quitting` are entered and left by the driver, not by [`feed`](SessionMachine::feed).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    CapNegotiating,
    Authenticating,
    Registering,
    Joining,
    Ready,
    Quitting,
}

/// Caller-supplied SASL credential, resolved to a concrete mechanism once
/// the server's CAP LS reply is known.
#[derive(Clone, Debug)]
pub struct SaslCredential {
    pub account_name: String,
    pub account_password: String,
    pub impersonate_account: Option<String>,
    pub allow_insecure_plain: bool,
    pub has_client_cert: bool,
}

/// Registration inputs the machine needs (a view onto [`crate::config::BotConfig`]).
#[derive(Clone, Debug)]
pub struct RegistrationInfo {
    pub nick: String,
    pub ident: String,
    pub realname: String,
    pub server_password: Option<String>,
    pub tls: bool,
}

/// Something for the driver to do in response to a fed message.
pub enum Action {
    /// Write this command to the wire (through the rate limiter).
    Send(CommandRecord),
    /// The machine moved to a new state.
    EnterState(SessionState),
    /// Merge these ISUPPORT tokens into the network state store.
    MergeIsupport(HashMap<String, Option<String>>),
    /// Registration completed; this is the nick the server confirmed.
    Registered { nick: String },
    /// The session must terminate.
    Fail(SessionError),
}

struct CapNegotiation {
    available: HashMap<String, Option<String>>,
    requested: Vec<String>,
    acked: Vec<String>,
    sasl_requested: bool,
}

impl CapNegotiation {
    fn new() -> Self {
        Self {
            available: HashMap::new(),
            requested: Vec::new(),
            acked: Vec::new(),
            sasl_requested: false,
        }
    }
}

/// Capabilities the framework always asks for when the server offers them
/// (spec.md §4.6).
const UNCONDITIONAL_CAPS: &[&str] = &[
    "multi-prefix",
    "userhost-in-names",
    "extended-join",
    "account-notify",
    "away-notify",
    "chghost",
    "setname",
    "draft/channel-rename",
];

struct SaslNegotiation {
    run: SaslRun,
    buffer: String,
    awaiting_go_ahead: bool,
}

/// The CAP/SASL/registration portion of spec.md §4.6's lifecycle.
pub struct SessionMachine {
    state: SessionState,
    options: FactoryOptions,
    reg: RegistrationInfo,
    sasl_credential: Option<SaslCredential>,
    extra_caps: Vec<String>,
    channel_binding: Option<(crate::sasl::scram::CBindType, Vec<u8>)>,
    cap: CapNegotiation,
    sasl: Option<SaslNegotiation>,
    nick_attempts: u32,
    isupport: HashMap<String, Option<String>>,
}

impl SessionMachine {
    #[must_use]
    pub fn new(
        reg: RegistrationInfo,
        sasl_credential: Option<SaslCredential>,
        extra_caps: Vec<String>,
    ) -> Self {
        Self {
            state: SessionState::Disconnected,
            options: FactoryOptions::default(),
            reg,
            sasl_credential,
            extra_caps,
            channel_binding: None,
            cap: CapNegotiation::new(),
            sasl: None,
            nick_attempts: 0,
            isupport: HashMap::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// TLS channel-binding bytes the transport exposed, if any (spec.md
    /// §4.5 "Channel binding"). Set once, after the TLS handshake
    /// completes and before `on_connected` fires, so `-PLUS` mechanisms
    /// are offered in CAP REQ.
    pub fn set_channel_binding(&mut self, binding: Option<(crate::sasl::scram::CBindType, Vec<u8>)>) {
        self.channel_binding = binding;
    }

    fn send(&self, verb: &str, args: Vec<String>) -> Result<Action, SessionError> {
        CommandFactory::prepare_client_command(verb, args, Vec::new(), &self.options).map(Action::Send)
    }

    /// The socket is connected; begin capability negotiation.
    pub fn on_connected(&mut self) -> Result<Vec<Action>, SessionError> {
        self.state = SessionState::CapNegotiating;
        Ok(vec![
            Action::EnterState(SessionState::CapNegotiating),
            self.send("CAP", vec!["LS".to_owned(), "302".to_owned()])?,
        ])
    }

    /// Feed one inbound message and collect the resulting actions.
    pub fn feed(&mut self, msg: &Message) -> Result<Vec<Action>, SessionError> {
        match &msg.command {
            Command::CAP(_, sub, a, b) => self.on_cap(sub, a.as_deref(), b.as_deref()),
            Command::AUTHENTICATE(payload) if self.state == SessionState::Authenticating => {
                self.on_authenticate(payload)
            }
            Command::Response(code, args) => self.on_numeric(*code, args),
            _ => Ok(Vec::new()),
        }
    }

    fn on_cap(
        &mut self,
        sub: &crate::command::subcommands::CapSubCommand,
        third: Option<&str>,
        fourth: Option<&str>,
    ) -> Result<Vec<Action>, SessionError> {
        use crate::command::subcommands::CapSubCommand;
        let mut out = Vec::new();
        match sub {
            CapSubCommand::LS => {
                let caps = fourth.or(third).unwrap_or("");
                for token in caps.split_ascii_whitespace() {
                    let (name, value) = match token.split_once('=') {
                        Some((n, v)) => (n.to_owned(), Some(v.to_owned())),
                        None => (token.to_owned(), None),
                    };
                    self.cap.available.insert(name, value);
                }
                // `third == Some("*")` with a populated `fourth` means more
                // LS lines follow; only request once the server signals
                // completion by sending a line without that marker.
                let more_follows = fourth.is_some() && third == Some("*");
                if !more_follows {
                    out.push(self.request_caps()?);
                }
            }
            CapSubCommand::ACK => {
                let acked = third.unwrap_or("");
                for name in acked.split_ascii_whitespace() {
                    let name = name.trim_start_matches('-');
                    self.cap.acked.push(name.to_owned());
                }
                if acked.split_ascii_whitespace().any(|n| n.trim_start_matches('-') == "sasl") {
                    out.extend(self.begin_sasl()?);
                } else if self.negotiation_settled() {
                    out.push(self.send("CAP", vec!["END".to_owned()])?);
                }
            }
            CapSubCommand::NAK => {
                if self.negotiation_settled() {
                    out.push(self.send("CAP", vec!["END".to_owned()])?);
                }
            }
            _ => {}
        }
        Ok(out)
    }

    fn negotiation_settled(&self) -> bool {
        !self.cap.sasl_requested || self.sasl.is_some()
    }

    fn request_caps(&mut self) -> Result<Action, SessionError> {
        let mut wanted: Vec<String> = UNCONDITIONAL_CAPS
            .iter()
            .filter(|c| self.cap.available.contains_key(**c))
            .map(|c| (*c).to_owned())
            .collect();
        for extra in &self.extra_caps {
            if self.cap.available.contains_key(extra) && !wanted.contains(extra) {
                wanted.push(extra.clone());
            }
        }
        if self.sasl_wanted() && self.cap.available.contains_key("sasl") {
            wanted.push("sasl".to_owned());
            self.cap.sasl_requested = true;
        }
        self.cap.requested = wanted.clone();
        if wanted.is_empty() {
            self.send("CAP", vec!["END".to_owned()])
        } else {
            self.send("CAP", vec!["REQ".to_owned(), wanted.join(" ")])
        }
    }

    fn sasl_wanted(&self) -> bool {
        self.sasl_credential.is_some()
    }

    fn begin_sasl(&mut self) -> Result<Vec<Action>, SessionError> {
        let Some(cred) = self.sasl_credential.clone() else {
            return Ok(vec![self.send("CAP", vec!["END".to_owned()])?]);
        };
        let server_sasl = self.cap.available.get("sasl").cloned().flatten().unwrap_or_default();
        let server_mechs = crate::sasl::parse_mechanisms(&server_sasl);
        let ctx = MechanismContext {
            tls: self.reg.tls,
            has_client_cert: cred.has_client_cert,
            channel_binding_available: self.channel_binding.is_some(),
            allow_insecure_plain: cred.allow_insecure_plain,
        };
        let chosen = if server_sasl.is_empty() {
            // No mechanism list advertised (older servers): fall back to
            // our own preference order and hope the server supports it.
            crate::sasl::preference_order(&ctx).into_iter().next()
        } else {
            crate::sasl::select_mechanism(&ctx, &server_mechs)
        };
        let Some(mechanism) = chosen else {
            return Err(SessionError::AuthFailed(
                "no mutually supported SASL mechanism".to_owned(),
            ));
        };

        let authcid = cred.impersonate_account.as_deref().unwrap_or(&cred.account_name);
        let authzid = cred.impersonate_account.as_deref().map(|_| cred.account_name.as_str());
        let run = match &mechanism {
            SaslMechanism::Plain => SaslRun::new_plain(authzid, authcid, &cred.account_password),
            SaslMechanism::External => SaslRun::new_external(authzid),
            SaslMechanism::Scram { hash, plus } => {
                let binding = match (plus, &self.channel_binding) {
                    (true, Some((kind, data))) => ChannelBinding::Required { kind: *kind, data: data.clone() },
                    (true, None) => {
                        return Err(SessionError::AuthFailed(
                            "server requires channel binding but none is available".to_owned(),
                        ))
                    }
                    (false, Some(_)) => ChannelBinding::NotRequested,
                    (false, None) => ChannelBinding::Unsupported,
                };
                SaslRun::new_scram(*hash, *plus, authcid, &cred.account_password, authzid, binding, None)
                    .map_err(|e| SessionError::AuthFailed(e.to_string()))?
            }
            SaslMechanism::Unknown(name) => {
                return Err(SessionError::AuthFailed(format!("unsupported mechanism {name}")))
            }
        };

        self.state = SessionState::Authenticating;
        let mech_name = run.mechanism_name().to_owned();
        self.sasl = Some(SaslNegotiation {
            run,
            buffer: String::new(),
            awaiting_go_ahead: true,
        });
        Ok(vec![
            Action::EnterState(SessionState::Authenticating),
            self.send("AUTHENTICATE", vec![mech_name])?,
        ])
    }

    fn on_authenticate(&mut self, payload: &str) -> Result<Vec<Action>, SessionError> {
        let Some(neg) = self.sasl.as_mut() else { return Ok(Vec::new()) };

        if neg.awaiting_go_ahead && payload == "+" && neg.buffer.is_empty() {
            neg.awaiting_go_ahead = false;
            return Ok(self.step_sasl(SaslEvent::InitialResponse)?);
        }

        if payload == "+" {
            // Terminator for a chunked payload, or (if nothing was
            // buffered) a genuinely empty challenge/server-final.
        } else {
            neg.buffer.push_str(payload);
            if payload.len() == crate::sasl::SASL_CHUNK_SIZE {
                return Ok(Vec::new());
            }
        }
        let full = std::mem::take(&mut self.sasl.as_mut().unwrap().buffer);
        self.step_sasl(SaslEvent::Challenge(full))
    }

    fn step_sasl(&mut self, event: SaslEvent) -> Result<Vec<Action>, SessionError> {
        let neg = self.sasl.as_mut().expect("step_sasl called without an active run");
        match event {
            SaslEvent::InitialResponse => {
                let step = neg.run.initial_response();
                self.apply_sasl_step(step)
            }
            SaslEvent::Challenge(full) => {
                if neg.run.expects_server_final() {
                    match neg.run.verify_server_final(&full) {
                        Ok(()) => Ok(Vec::new()),
                        Err(err) => Ok(vec![Action::Fail(err)]),
                    }
                } else {
                    let step = neg.run.step(&full);
                    self.apply_sasl_step(step)
                }
            }
        }
    }

    fn apply_sasl_step(&mut self, step: SaslStep) -> Result<Vec<Action>, SessionError> {
        match step {
            SaslStep::Send(payload) => {
                let mut out = Vec::new();
                for chunk in chunk_authenticate_payload(&payload) {
                    out.push(self.send("AUTHENTICATE", vec![chunk])?);
                }
                Ok(out)
            }
            SaslStep::AwaitingServer => Ok(Vec::new()),
            SaslStep::Failed(err) => Ok(vec![Action::Fail(err)]),
        }
    }

    fn on_numeric(&mut self, code: Response, args: &[String]) -> Result<Vec<Action>, SessionError> {
        let mut out = Vec::new();
        match code {
            Response::RPL_LOGGEDIN => {}
            Response::RPL_SASLSUCCESS => {
                self.sasl = None;
                out.push(self.send("CAP", vec!["END".to_owned()])?);
            }
            Response::ERR_SASLFAIL | Response::ERR_SASLTOOLONG | Response::ERR_SASLABORT | Response::ERR_SASLALREADY => {
                self.sasl = None;
                out.push(Action::Fail(SessionError::AuthFailed(format!(
                    "SASL rejected: {}",
                    args.last().map(String::as_str).unwrap_or("")
                ))));
            }
            Response::RPL_ISUPPORT => {
                let refs: Vec<&str> = args.iter().map(String::as_str).collect();
                if let Some(tokens) = crate::isupport::Isupport::from_response_args(&refs) {
                    let mut merged = HashMap::new();
                    for entry in tokens.iter() {
                        self.isupport.insert(entry.key.to_owned(), entry.value.map(str::to_owned));
                        merged.insert(entry.key.to_owned(), entry.value.map(str::to_owned));
                    }
                    out.push(Action::MergeIsupport(merged));
                }
            }
            Response::RPL_WELCOME => {
                let nick = args.first().cloned().unwrap_or_else(|| self.reg.nick.clone());
                self.state = SessionState::Joining;
                out.push(Action::Registered { nick });
                out.push(Action::EnterState(SessionState::Joining));
            }
            Response::ERR_NICKNAMEINUSE | Response::ERR_ERRONEOUSNICKNAME
                if self.state == SessionState::Registering || self.state == SessionState::CapNegotiating =>
            {
                self.nick_attempts += 1;
                let retry = format!("{}{}", self.reg.nick, "_".repeat(self.nick_attempts as usize));
                out.push(self.send("NICK", vec![retry])?);
            }
            _ => {}
        }
        Ok(out)
    }

    /// Emit `CAP END`, `PASS`/`NICK`/`USER` once CAP negotiation has
    /// settled (called by the driver right after processing whatever
    /// `feed` returned for the message that ended negotiation, or
    /// directly if the server never advertised `sasl`/any cap at all).
    pub fn begin_registration(&mut self) -> Result<Vec<Action>, SessionError> {
        self.state = SessionState::Registering;
        let mut out = vec![Action::EnterState(SessionState::Registering)];
        if let Some(password) = self.reg.server_password.clone() {
            out.push(self.send("PASS", vec![password])?);
        }
        out.push(self.send("NICK", vec![self.reg.nick.clone()])?);
        out.push(self.send(
            "USER",
            vec![self.reg.ident.clone(), "0".to_owned(), "*".to_owned(), self.reg.realname.clone()],
        )?);
        Ok(out)
    }

    /// Called by the driver once it observes `Command::CAP(.., END, ..)`
    /// echoed back, or immediately after sending `CAP END` itself — some
    /// servers don't echo it.
    pub fn force_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// The accumulated ISUPPORT tokens observed so far, and the current
    /// state's view of casemapping/chantypes/prefixes for building a
    /// [`NetworkInfo`].
    #[must_use]
    pub fn isupport_snapshot(&self) -> &HashMap<String, Option<String>> {
        &self.isupport
    }
}

enum SaslEvent {
    InitialResponse,
    Challenge(String),
}

/// Build a [`NetworkInfo`] from accumulated ISUPPORT tokens plus the
/// confirmed nick/ident/host (spec.md §4.6 "parse 005 ISUPPORT tokens").
#[must_use]
pub fn network_info_from_isupport(
    self_nick: String,
    self_ident: String,
    self_host: String,
    isupport: &HashMap<String, Option<String>>,
) -> NetworkInfo {
    let case_mapping = isupport
        .get("CASEMAPPING")
        .and_then(|v| v.as_deref())
        .and_then(crate::casemap::CaseMapping::parse)
        .unwrap_or_default();
    let chantypes = isupport
        .get("CHANTYPES")
        .and_then(|v| v.as_deref())
        .map(|s| s.chars().collect())
        .unwrap_or_else(|| vec!['#', '&']);
    let prefix_symbols = isupport
        .get("PREFIX")
        .and_then(|v| v.as_deref())
        .and_then(crate::isupport::PrefixSpec::parse)
        .map(|spec| spec.prefixes.chars().collect())
        .unwrap_or_else(|| vec!['@', '+']);

    NetworkInfo {
        self_nick,
        self_ident,
        self_host,
        isupport: isupport.clone(),
        chantypes,
        prefix_symbols,
        case_mapping,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg() -> RegistrationInfo {
        RegistrationInfo {
            nick: "bot".to_owned(),
            ident: "bot".to_owned(),
            realname: "A Bot".to_owned(),
            server_password: None,
            tls: true,
        }
    }

    #[test]
    fn cap_ls_without_sasl_requests_unconditional_caps_then_ends() {
        let mut m = SessionMachine::new(reg(), None, Vec::new());
        m.on_connected().unwrap();
        let msg: Message = "CAP * LS :multi-prefix sasl=PLAIN,SCRAM-SHA-256".parse().unwrap();
        let actions = m.feed(&msg).unwrap();
        let sends: Vec<_> = actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(cmd) => Some(cmd.full_command()),
                _ => None,
            })
            .collect();
        assert!(sends.iter().any(|s| s.contains("CAP REQ") && s.contains("multi-prefix")));
    }

    #[test]
    fn nick_in_use_retries_with_suffix() {
        let mut m = SessionMachine::new(reg(), None, Vec::new());
        m.force_state(SessionState::Registering);
        let msg: Message = "433 * bot :Nickname is already in use".parse().unwrap();
        let actions = m.feed(&msg).unwrap();
        let sent = actions.iter().find_map(|a| match a {
            Action::Send(cmd) if cmd.verb() == "NICK" => Some(cmd.args()[0].clone()),
            _ => None,
        });
        assert_eq!(sent, Some("bot_".to_owned()));
    }

    #[test]
    fn welcome_transitions_to_joining_and_reports_confirmed_nick() {
        let mut m = SessionMachine::new(reg(), None, Vec::new());
        m.force_state(SessionState::Registering);
        let msg: Message = "001 bot :Welcome to the network".parse().unwrap();
        let actions = m.feed(&msg).unwrap();
        assert!(actions.iter().any(|a| matches!(a, Action::EnterState(SessionState::Joining))));
        assert!(actions.iter().any(|a| matches!(a, Action::Registered { nick } if nick == "bot")));
        assert_eq!(m.state(), SessionState::Joining);
    }

    #[test]
    fn isupport_tokens_accumulate_across_multiple_005_lines() {
        let mut m = SessionMachine::new(reg(), None, Vec::new());
        let first: Message = "005 bot CHANTYPES=# NICKLEN=30 :are supported by this server".parse().unwrap();
        let second: Message = "005 bot CASEMAPPING=rfc1459 :are supported by this server".parse().unwrap();
        m.feed(&first).unwrap();
        m.feed(&second).unwrap();
        let snap = m.isupport_snapshot();
        assert_eq!(snap.get("CHANTYPES").cloned().flatten(), Some("#".to_owned()));
        assert_eq!(snap.get("CASEMAPPING").cloned().flatten(), Some("rfc1459".to_owned()));
    }
}
