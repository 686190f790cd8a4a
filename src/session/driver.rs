//! The owning async driver task (spec.md §4.6/§4.7).
//!
//! [`SessionDriver::spawn`] takes a [`Transport`] that is already
//! connected (and, for TLS, already handshaked — dialing the socket and
//! negotiating TLS is the embedding application's job, not this crate's:
//! [`crate::transport::Transport`]'s constructors all take a ready stream)
//! and drives CAP negotiation, SASL, registration, channel joins and
//! graceful shutdown over it. [`SessionHandle`] is the cloneable public
//! handle callers use to send commands and subscribe to inbound traffic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::command::record::{CommandFactory, CommandRecord, FactoryOptions};
use crate::config::BotConfig;
use crate::error::SessionError;
use crate::message::Message;
use crate::netstate::NetworkState;
use crate::ratelimit::RateLimiter;
use crate::response::Response;
use crate::sasl::scram::CBindType;
use crate::session::deferred::DeferredCommand;
use crate::session::machine::{
    network_info_from_isupport, Action, RegistrationInfo, SaslCredential, SessionMachine, SessionState,
};
use crate::transport::Transport;
use crate::Command;

/// Numerics that terminate a failed `JOIN` attempt (spec.md §4.6
/// "Joining"): `ERR_NOSUCHCHANNEL`, `ERR_BANNEDFROMCHAN`,
/// `ERR_INVITEONLYCHAN`, `ERR_BADCHANNELKEY`, `ERR_CHANNELISFULL`,
/// `ERR_TOOMANYCHANNELS`, `ERR_BADCHANMASK`.
const JOIN_ERROR_NUMERICS: &[Response] = &[
    Response::ERR_NOSUCHCHANNEL,
    Response::ERR_BANNEDFROMCHAN,
    Response::ERR_INVITEONLYCHAN,
    Response::ERR_BADCHANNELKEY,
    Response::ERR_CHANNELISFULL,
    Response::ERR_TOOMANYCHANNELS,
    Response::ERR_BADCHANMASK,
];

/// Decrypts an `OPER`/`CHALLENGE` RSA-OAEP-SHA1 ciphertext with the
/// operator's private key. The key itself (file format, password
/// handling) is the embedding application's concern — this crate only
/// orchestrates the numeric exchange around it.
pub trait ChallengeResponder: Send + Sync {
    /// `ciphertext` is the concatenated, base64-decoded payload collected
    /// from the server's `RPL_RSACHALLENGE2` (740) lines. Returns the
    /// decrypted plaintext to be SHA1-hashed and base64-encoded back to
    /// the server as the `CHALLENGE` response.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, SessionError>;
}

/// A cloneable handle to a running session: send commands, subscribe to
/// inbound traffic, inspect network state, or request shutdown.
#[derive(Clone)]
pub struct SessionHandle {
    outbound: mpsc::UnboundedSender<CommandRecord>,
    inbound: broadcast::Sender<Arc<Message>>,
    state: Arc<NetworkState>,
    options: FactoryOptions,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// The lock-free view of everything this session currently knows
    /// about the network.
    #[must_use]
    pub fn network_state(&self) -> &Arc<NetworkState> {
        &self.state
    }

    /// Subscribe to every inbound message the driver reads off the wire,
    /// from this point forward.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Message>> {
        self.inbound.subscribe()
    }

    /// Build a deferred send for an arbitrary client command. Attach
    /// `with_reply`/`with_replies` before awaiting it, or call `.send()`
    /// directly for fire-and-forget.
    pub fn send(&self, verb: &str, args: Vec<String>) -> Result<DeferredCommand, SessionError> {
        let cmd = CommandFactory::prepare_client_command(verb, args, Vec::new(), &self.options)?;
        Ok(DeferredCommand::new(cmd, self.outbound.clone(), self.inbound.clone()))
    }

    /// Send a `PRIVMSG`/`NOTICE`, splitting across multiple lines (and a
    /// `draft/multiline` batch, once negotiated) as needed. `shared_channel`
    /// names the channel to route through `CPRIVMSG`/`CNOTICE` when the
    /// target and the bot share voice/op status there; pass `None` for an
    /// ordinary `PRIVMSG`/`NOTICE`.
    pub fn send_message(
        &self,
        kind: crate::command::record::MessageKind,
        self_ident_len: usize,
        target: &str,
        text: &str,
        shared_channel: Option<&str>,
    ) -> Result<Vec<DeferredCommand>, SessionError> {
        let records = CommandFactory::prepare_client_message(
            self_ident_len,
            kind,
            target,
            text,
            Vec::new(),
            shared_channel,
            &self.options,
        )?;
        Ok(records
            .into_iter()
            .map(|cmd| DeferredCommand::new(cmd, self.outbound.clone(), self.inbound.clone()))
            .collect())
    }

    /// Request the session end gracefully: send `QUIT reason`, then
    /// cancel every outstanding wait and let the driver task close the
    /// socket. Uncancellable itself — the driver always runs this to
    /// completion once asked.
    pub fn disconnect(&self, reason: &str) {
        let _ = self.send("QUIT", vec![reason.to_owned()]).map(|d| {
            let outbound = self.outbound.clone();
            tokio::spawn(async move {
                let _ = d.send().await;
            });
            let _ = outbound;
        });
        self.cancel.cancel();
    }

    /// The token the driver task watches for cancellation; exposed so
    /// callers can tie their own lifetime to it without going through
    /// `disconnect`.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Owns the transport and the `SessionMachine`; runs as a single spawned
/// task for the lifetime of the connection.
pub struct SessionDriver;

impl SessionDriver {
    /// Spawn the driver task over an already-connected `transport`.
    /// `channel_binding` is the TLS exporter/unique/end-point-cert bytes
    /// the caller's TLS layer produced, if any (spec.md §4.5 "Channel
    /// binding"), needed before CAP negotiation picks a `-PLUS` SASL
    /// mechanism.
    pub fn spawn(
        transport: Transport,
        config: BotConfig,
        channel_binding: Option<(CBindType, Vec<u8>)>,
        challenge_responder: Option<Arc<dyn ChallengeResponder>>,
    ) -> (SessionHandle, JoinHandle<Result<(), SessionError>>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, _) = broadcast::channel(1024);
        let state = Arc::new(NetworkState::new());
        let cancel = CancellationToken::new();
        let limiter = Arc::new(RateLimiter::new(4, 2.0));

        let handle = SessionHandle {
            outbound: outbound_tx.clone(),
            inbound: inbound_tx.clone(),
            state: state.clone(),
            options: FactoryOptions::default(),
            cancel: cancel.clone(),
        };

        let join = tokio::spawn(run(
            transport,
            config,
            channel_binding,
            challenge_responder,
            outbound_tx,
            outbound_rx,
            inbound_tx,
            state,
            cancel,
            limiter,
        ));

        (handle, join)
    }
}

async fn send_record(transport: &mut Transport, limiter: &RateLimiter, cancel: &CancellationToken, cmd: &CommandRecord) -> Result<(), SessionError> {
    limiter.acquire(cancel).await?;
    transport
        .write_message(&cmd.full_command())
        .await
        .map_err(|e| SessionError::Transport(e.to_string()))
}

/// Enqueue an `Action`'s write (if any) onto the outbound queue the main
/// loop drains, rather than writing straight to the socket. Every outbound
/// command — registration traffic, SASL, OPER/CHALLENGE, joins, WHO,
/// ordinary handler sends — passes through this one FIFO queue, so a
/// single always-running drain loop (see `run`) is enough to guarantee
/// spec.md §5's "no reordering" property regardless of which phase of the
/// lifecycle produced the command.
fn apply_action(
    outbound_tx: &mpsc::UnboundedSender<CommandRecord>,
    action: Action,
) -> Result<(), SessionError> {
    match action {
        Action::Send(cmd) => outbound_tx
            .send(cmd)
            .map_err(|_| SessionError::Transport("session writer task has stopped".to_owned())),
        Action::EnterState(state) => {
            trace!(?state, "session state transition");
            Ok(())
        }
        Action::MergeIsupport(_) => Ok(()),
        Action::Registered { nick } => {
            debug!(nick, "registration complete");
            Ok(())
        }
        Action::Fail(err) => Err(err),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    mut transport: Transport,
    config: BotConfig,
    channel_binding: Option<(CBindType, Vec<u8>)>,
    challenge_responder: Option<Arc<dyn ChallengeResponder>>,
    outbound_tx: mpsc::UnboundedSender<CommandRecord>,
    mut outbound_rx: mpsc::UnboundedReceiver<CommandRecord>,
    inbound_tx: broadcast::Sender<Arc<Message>>,
    state: Arc<NetworkState>,
    cancel: CancellationToken,
    limiter: Arc<RateLimiter>,
) -> Result<(), SessionError> {
    let reg = RegistrationInfo {
        nick: config.nick.clone(),
        ident: config.ident.clone(),
        realname: config.realname.clone(),
        server_password: config.server_password.clone(),
        tls: config.servers.first().is_some_and(|s| s.tls),
    };
    let sasl_credential = config.sasl.is_configured().then(|| SaslCredential {
        account_name: config.sasl.account_name.clone().unwrap_or_default(),
        account_password: config.sasl.account_password.clone().unwrap_or_default(),
        impersonate_account: config.sasl.impersonate_account.clone(),
        allow_insecure_plain: config.sasl.allow_insecure_sasl_plain,
        has_client_cert: config.sasl.account_certificate_file.is_some(),
    });

    let mut machine = SessionMachine::new(reg, sasl_credential, Vec::new());
    machine.set_channel_binding(channel_binding);

    for action in machine.on_connected()? {
        apply_action(&outbound_tx, action)?;
    }

    let mut registering = true;
    let mut post_registration_spawned = false;

    // One loop for the entire connection lifetime: a single task reads
    // the socket and a single task (this one) drains the outbound queue,
    // so every phase — CAP/SASL/registration, OPER/CHALLENGE, parallel
    // channel joins, and steady-state traffic — shares the same FIFO
    // writer and the same broadcast of inbound lines. Splitting this into
    // separate per-phase loops (as an earlier revision did) starves
    // DeferredCommand waiters raised by `oper_task`/`join_channels`: their
    // sends sit in `outbound_rx` and their replies sit unread on the
    // socket until some *other* loop happens to run.
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            maybe_cmd = outbound_rx.recv() => {
                match maybe_cmd {
                    Some(cmd) => send_record(&mut transport, &limiter, &cancel, &cmd).await?,
                    None => return Ok(()),
                }
            }
            line = transport.read_message() => {
                let raw = match line {
                    Ok(Some(raw)) => raw,
                    Ok(None) if registering => {
                        return Err(SessionError::Transport("connection closed during registration".to_owned()))
                    }
                    Ok(None) => return Ok(()),
                    Err(e) => return Err(SessionError::Transport(e.to_string())),
                };
                let Ok(msg) = raw.parse::<Message>() else {
                    warn!(line = %raw, "unparseable line, ignoring");
                    continue;
                };
                let msg = Arc::new(msg);
                let _ = inbound_tx.send(msg.clone());

                if registering {
                    let actions = machine.feed(&msg)?;
                    let sent_cap_end = actions
                        .iter()
                        .any(|a| matches!(a, Action::Send(cmd) if cmd.verb() == "CAP" && cmd.args().last().is_some_and(|a| a == "END")));
                    for action in actions {
                        apply_action(&outbound_tx, action)?;
                    }

                    // `feed` sends `CAP END` itself once negotiation
                    // settles (or never requested any caps at all) —
                    // that's our signal to move straight into
                    // registration, without waiting for a server echo
                    // that most IRCds never send.
                    if sent_cap_end && machine.state() == SessionState::CapNegotiating {
                        machine.force_state(SessionState::Registering);
                        for action in machine.begin_registration()? {
                            apply_action(&outbound_tx, action)?;
                        }
                    }

                    if machine.state() == SessionState::Joining {
                        registering = false;

                        let nick = state.info().self_nick;
                        let info = network_info_from_isupport(
                            if nick.is_empty() { config.nick.clone() } else { nick },
                            config.ident.clone(),
                            String::new(),
                            machine.isupport_snapshot(),
                        );
                        state.set_info(info);
                    }
                }

                // Fan out OPER/CHALLENGE and the parallel channel joins as
                // background tasks the moment registration completes,
                // instead of blocking this loop on them: they communicate
                // purely through `outbound_tx`/`inbound_tx`, which this
                // same loop keeps servicing concurrently.
                if !registering && !post_registration_spawned {
                    post_registration_spawned = true;
                    tokio::spawn(run_oper_and_joins(
                        config.clone(),
                        state.clone(),
                        inbound_tx.clone(),
                        outbound_tx.clone(),
                        cancel.clone(),
                        challenge_responder.clone(),
                    ));
                }
            }
        }
    }
}

/// Runs after `RPL_WELCOME`: best-effort OPER/CHALLENGE, then the
/// parallel channel-join fan-out. Spawned once as a background task so
/// the driver's read/write loop keeps running while these wait on their
/// own deferred replies.
async fn run_oper_and_joins(
    config: BotConfig,
    state: Arc<NetworkState>,
    inbound_tx: broadcast::Sender<Arc<Message>>,
    outbound_tx: mpsc::UnboundedSender<CommandRecord>,
    cancel: CancellationToken,
    challenge_responder: Option<Arc<dyn ChallengeResponder>>,
) {
    if let Some(oper) = oper_task(&config, &inbound_tx, &outbound_tx, &cancel, challenge_responder.as_deref()).await {
        if let Err(err) = oper {
            warn!(error = %err, "OPER/CHALLENGE did not complete");
        }
    }

    join_channels(&config, &state, &inbound_tx, &outbound_tx, &cancel).await;
}

/// Best-effort `/OPER` (and, if a private key is configured,
/// `/CHALLENGE`), followed by a templated services-OPER command
/// (spec.md §4.6 "Joining" preamble). Returns `None` if no operator
/// credential was configured at all.
async fn oper_task(
    config: &BotConfig,
    inbound_tx: &broadcast::Sender<Arc<Message>>,
    outbound_tx: &mpsc::UnboundedSender<CommandRecord>,
    cancel: &CancellationToken,
    challenge_responder: Option<&dyn ChallengeResponder>,
) -> Option<Result<(), SessionError>> {
    let oper = &config.oper;
    if oper.oper_name.is_none() && oper.service_oper_command.is_none() {
        return None;
    }

    Some(
        async {
            if let Some(name) = &oper.oper_name {
                if oper.challenge_key_file.is_some() {
                    challenge(name, inbound_tx, outbound_tx, cancel, challenge_responder).await?;
                } else if let Some(password) = &oper.oper_password {
                    let cmd = CommandFactory::prepare_client_command(
                        "OPER",
                        vec![name.clone(), password.clone()],
                        Vec::new(),
                        &FactoryOptions::default(),
                    )?;
                    enqueue(outbound_tx, cmd)?;
                }
            }

            if let (Some(tmpl), Some(password)) = (&oper.service_oper_command, &oper.service_oper_password) {
                tokio::time::sleep(Duration::from_secs(5)).await;
                let filled = tmpl.replace("{password}", password);
                if let Some((verb, rest)) = filled.split_once(' ') {
                    let args: Vec<String> = rest.split(' ').map(ToOwned::to_owned).collect();
                    let cmd = CommandFactory::prepare_client_command(verb, args, Vec::new(), &FactoryOptions::default())?;
                    enqueue(outbound_tx, cmd)?;
                }
            }

            Ok(())
        }
        .await,
    )
}

fn enqueue(outbound_tx: &mpsc::UnboundedSender<CommandRecord>, cmd: CommandRecord) -> Result<(), SessionError> {
    outbound_tx
        .send(cmd)
        .map_err(|_| SessionError::Transport("session writer task has stopped".to_owned()))
}

/// `/CHALLENGE <oper-name>`, collect the `RPL_RSACHALLENGE2` (740) lines
/// up to `RPL_ENDOFRSACHALLENGE2` (741), decrypt with the configured key,
/// and respond with `CHALLENGE <sha1-digest-base64>`. These numerics
/// aren't in [`Response`]'s catalogue (they're an Unreal-specific
/// extension), so they arrive as [`Command::Raw`].
async fn challenge(
    oper_name: &str,
    inbound_tx: &broadcast::Sender<Arc<Message>>,
    outbound_tx: &mpsc::UnboundedSender<CommandRecord>,
    cancel: &CancellationToken,
    responder: Option<&dyn ChallengeResponder>,
) -> Result<(), SessionError> {
    let Some(responder) = responder else {
        return Err(SessionError::InvalidArgument(
            "challenge_key_file configured but no ChallengeResponder was supplied".to_owned(),
        ));
    };

    let mut rx = inbound_tx.subscribe();
    let cmd = CommandFactory::prepare_client_command(
        "CHALLENGE",
        vec![oper_name.to_owned()],
        Vec::new(),
        &FactoryOptions::default(),
    )?;
    enqueue(outbound_tx, cmd)?;

    let mut chunks = String::new();
    let sleep = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            () = &mut sleep => return Err(SessionError::Timeout),
            () = cancel.cancelled() => return Err(SessionError::Cancelled),
            received = rx.recv() => {
                let msg = match received {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(SessionError::Transport("session closed".to_owned()))
                    }
                };
                match &msg.command {
                    Command::Raw(name, args) if name == "740" => {
                        if let Some(chunk) = args.last() {
                            chunks.push_str(chunk);
                        }
                    }
                    Command::Raw(name, _) if name == "741" => break,
                    _ => {}
                }
            }
        }
    }

    let ciphertext = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, chunks.trim())
        .map_err(|e| SessionError::AuthFailed(format!("malformed CHALLENGE payload: {e}")))?;
    let plaintext = responder.decrypt(&ciphertext)?;

    use sha1::{Digest, Sha1};
    let digest = Sha1::digest(&plaintext);
    let response = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, digest);

    let cmd = CommandFactory::prepare_client_command(
        "CHALLENGE",
        vec![response],
        Vec::new(),
        &FactoryOptions::default(),
    )?;
    enqueue(outbound_tx, cmd)
}

/// Join every configured channel in parallel, each bounded by
/// `config.join_timeout`, folding the membership list in via a
/// WHOX-formatted `WHO` once the join itself is confirmed (spec.md §4.6
/// "Joining").
async fn join_channels(
    config: &BotConfig,
    state: &Arc<NetworkState>,
    inbound_tx: &broadcast::Sender<Arc<Message>>,
    outbound_tx: &mpsc::UnboundedSender<CommandRecord>,
    cancel: &CancellationToken,
) {
    if config.channels.is_empty() {
        return;
    }

    let self_nick = state.info().self_nick;
    let mut handles = Vec::new();
    for chan in &config.channels {
        let name = chan.name.clone();
        let key = chan.key.clone();
        let self_nick = self_nick.clone();
        let inbound_tx = inbound_tx.clone();
        let outbound_tx = outbound_tx.clone();
        let state = state.clone();
        let cancel = cancel.clone();
        let join_timeout = config.join_timeout;
        handles.push(tokio::spawn(async move {
            if let Err(err) = join_one(&name, key.as_deref(), &self_nick, &inbound_tx, &outbound_tx, &state, join_timeout, &cancel).await {
                warn!(channel = %name, error = %err, "channel join failed");
            }
        }));
    }

    // Bound the whole fan-out by the same timeout rather than letting a
    // single stuck join wedge the driver's path to `Ready` indefinitely;
    // individual joins already race their own `join_timeout` internally.
    let _ = tokio::time::timeout(config.join_timeout + Duration::from_secs(1), async {
        for h in handles {
            let _ = h.await;
        }
    })
    .await;
}

async fn join_one(
    channel: &str,
    key: Option<&str>,
    self_nick: &str,
    inbound_tx: &broadcast::Sender<Arc<Message>>,
    outbound_tx: &mpsc::UnboundedSender<CommandRecord>,
    state: &Arc<NetworkState>,
    join_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), SessionError> {
    let mut args = vec![channel.to_owned()];
    if let Some(key) = key {
        args.push(key.to_owned());
    }
    let join_cmd = CommandFactory::prepare_client_command("JOIN", args, Vec::new(), &FactoryOptions::default())?;

    let self_nick_owned = self_nick.to_owned();
    let channel_owned = channel.to_owned();
    let deferred = DeferredCommand::new(join_cmd, outbound_tx.clone(), inbound_tx.clone());
    let error_channel = channel_owned.clone();
    let waiter = deferred.with_reply(move |m| match &m.command {
        Command::JOIN(chans, _, _) => {
            m.prefix.as_ref().and_then(|p| p.nickname()) == Some(self_nick_owned.as_str())
                && chans.split(',').any(|c| c == channel_owned)
        }
        Command::Response(code, args) => JOIN_ERROR_NUMERICS.contains(code) && args.get(1).is_some_and(|a| a == &error_channel),
        _ => false,
    });

    let result = waiter.wait(join_timeout, cancel).await?;
    if let Command::Response(code, _) = &result.command {
        return Err(SessionError::BadState(format!("JOIN {channel} rejected: {code:?}")));
    }

    state.add_member(channel, state.get_or_add_user(self_nick, "", ""), "");

    let token = crate::netstate::next_whox_token();
    let who_cmd = CommandFactory::prepare_client_command(
        "WHO",
        vec![channel.to_owned(), format!("%tcuhnfar,{token}")],
        Vec::new(),
        &FactoryOptions::default(),
    )?;
    let channel_owned = channel.to_owned();
    let token_str = token.to_string();
    let who_waiter = DeferredCommand::new(who_cmd, outbound_tx.clone(), inbound_tx.clone()).with_replies(
        move |m| matches!(&m.command, Command::Response(r, _) if *r == Response::RPL_WHOSPCRPL),
        move |m| matches!(&m.command, Command::Response(r, args) if *r == Response::RPL_ENDOFWHO && args.get(1).is_some_and(|a| a == &channel_owned)),
    );

    match who_waiter.collect(join_timeout, cancel).await {
        Ok(replies) => fold_who_replies(state, &channel.to_owned(), &replies, &token_str),
        Err(SessionError::Timeout) => {
            // WHOX wasn't understood (server lacks the `WHOX` ISUPPORT
            // token) or the reply never matched our token; membership
            // still reflects the join itself via NAMES/JOIN echoes the
            // driver's main read loop folds in separately.
        }
        Err(err) => return Err(err),
    }

    Ok(())
}

fn fold_who_replies(state: &NetworkState, channel: &str, replies: &[Arc<Message>], expected_token: &str) {
    for msg in replies {
        let Command::Response(code, args) = &msg.command else { continue };
        match *code {
            Response::RPL_WHOSPCRPL => {
                // `client token channel user host nick flags account :realname`
                if args.len() < 9 || args[1] != expected_token {
                    continue;
                }
                let (user, host, nick, flags, account, realname) =
                    (&args[3], &args[4], &args[5], &args[6], &args[7], &args[8]);
                let id = state.get_or_add_user(nick, user, host);
                state.set_host(id, user.clone(), host.clone());
                state.set_realname(id, realname.clone());
                if account != "0" {
                    state.set_account(id, Some(account.clone()));
                }
                let prefixes: String = flags.chars().filter(|c| !c.is_ascii_alphabetic()).collect();
                state.add_member(channel, id, &prefixes);
            }
            Response::RPL_ENDOFWHO => {}
            _ => {}
        }
    }
}
