//! SASL mechanism stepping (spec.md §4.5/§4.6): turns a chosen
//! [`SaslMechanism`] into the sequence of base64 payloads an
//! `AUTHENTICATE` exchange sends, independent of how the surrounding
//! numerics/`AUTHENTICATE` continuations are read off the wire. Numeric
//! completion (900/903/904-907) is interpreted by the driver loop that
//! owns the inbound stream, not here.

use zeroize::Zeroizing;

use crate::error::SessionError;
use crate::sasl::{
    self, scram::{ChannelBinding, MfaCredential, ScramClient, ScramError},
    SaslMechanism, ScramHash, SASL_CHUNK_SIZE,
};

/// What to do next with a SASL run.
pub enum SaslStep {
    /// Send this base64 payload, chunked into `AUTHENTICATE` lines by
    /// [`chunk_authenticate_payload`] if it exceeds 400 bytes.
    Send(String),
    /// The mechanism has nothing further to send; wait for the server's
    /// numeric to decide success or failure.
    AwaitingServer,
    /// The mechanism itself rejected something before any numeric arrived
    /// (e.g. a malformed server-first message).
    Failed(SessionError),
}

enum SaslKind {
    Plain {
        authzid: Option<String>,
        authcid: String,
        password: Zeroizing<String>,
        sent: bool,
    },
    External {
        authzid: Option<String>,
        sent: bool,
    },
    Scram(ScramClient),
}

/// One SASL authentication attempt in progress, holding whatever
/// mechanism-specific state it needs between `AUTHENTICATE` round trips.
pub struct SaslRun {
    mechanism: SaslMechanism,
    kind: SaslKind,
}

impl SaslRun {
    /// The mechanism name as it was (or will be) sent on `AUTHENTICATE
    /// <mechanism>`.
    #[must_use]
    pub fn mechanism_name(&self) -> &str {
        self.mechanism.as_str()
    }

    /// PLAIN (RFC 4616): single response, no server challenge expected
    /// beyond the initial `AUTHENTICATE +`.
    #[must_use]
    pub fn new_plain(authzid: Option<&str>, authcid: &str, password: &str) -> Self {
        Self {
            mechanism: SaslMechanism::Plain,
            kind: SaslKind::Plain {
                authzid: authzid.map(ToOwned::to_owned),
                authcid: authcid.to_owned(),
                password: Zeroizing::new(password.to_owned()),
                sent: false,
            },
        }
    }

    /// EXTERNAL: single response carrying only (optionally) an authzid;
    /// the actual credential is the TLS client certificate already
    /// presented during the handshake.
    #[must_use]
    pub fn new_external(authzid: Option<&str>) -> Self {
        Self {
            mechanism: SaslMechanism::External,
            kind: SaslKind::External {
                authzid: authzid.map(ToOwned::to_owned),
                sent: false,
            },
        }
    }

    /// SCRAM-SHA-*[-PLUS]: three-step challenge/response. `plus` is
    /// recorded only in the advertised mechanism name — the caller is
    /// responsible for passing a [`ChannelBinding::Required`] when `plus`
    /// is true.
    pub fn new_scram(
        hash: ScramHash,
        plus: bool,
        username: &str,
        password: &str,
        authzid: Option<&str>,
        channel_binding: ChannelBinding,
        mfa: Option<MfaCredential>,
    ) -> Result<Self, ScramError> {
        let client = ScramClient::new(hash, username, password, authzid, channel_binding, mfa)?;
        Ok(Self {
            mechanism: SaslMechanism::Scram { hash, plus },
            kind: SaslKind::Scram(client),
        })
    }

    /// Produce the client's first message, before any server challenge
    /// has arrived. Call once, immediately after `AUTHENTICATE
    /// <mechanism>` is acknowledged by the server's `AUTHENTICATE +`.
    pub fn initial_response(&mut self) -> SaslStep {
        match &mut self.kind {
            SaslKind::Plain { authzid, authcid, password, sent } => {
                *sent = true;
                let encoded = match authzid {
                    Some(authzid) => sasl::encode_plain_with_authzid(authzid, authcid, password),
                    None => sasl::encode_plain(authcid, password),
                };
                SaslStep::Send(encoded)
            }
            SaslKind::External { authzid, sent } => {
                *sent = true;
                SaslStep::Send(sasl::encode_external(authzid.as_deref()))
            }
            SaslKind::Scram(client) => SaslStep::Send(client.client_first_message()),
        }
    }

    /// Feed a base64-decoded-able server challenge (the argument of an
    /// `AUTHENTICATE <payload>` line sent by the server) and get back the
    /// next thing to do.
    pub fn step(&mut self, challenge: &str) -> SaslStep {
        match &mut self.kind {
            SaslKind::Plain { sent, .. } | SaslKind::External { sent, .. } => {
                // PLAIN/EXTERNAL are one-shot; a further challenge after
                // the initial response means the server is confused or
                // we are — either way there is nothing more to send.
                if *sent {
                    SaslStep::AwaitingServer
                } else {
                    SaslStep::Failed(SessionError::AuthFailed(
                        "unexpected SASL challenge before initial response was sent".to_owned(),
                    ))
                }
            }
            SaslKind::Scram(client) => match client.process_server_first(challenge) {
                Ok(client_final) => SaslStep::Send(client_final),
                Err(err) => SaslStep::Failed(SessionError::AuthFailed(err.to_string())),
            },
        }
    }

    /// Whether the next `AUTHENTICATE` payload from the server is a
    /// server-final message (to be handed to
    /// [`verify_server_final`](Self::verify_server_final)) rather than a
    /// challenge (to be handed to [`step`](Self::step)). Always `false`
    /// for PLAIN/EXTERNAL, which have no server-final message.
    #[must_use]
    pub fn expects_server_final(&self) -> bool {
        matches!(
            &self.kind,
            SaslKind::Scram(client) if matches!(client.state(), sasl::scram::ScramState::ClientFinalSent)
        )
    }

    /// Verify the server's final message (`v=...`) once the server has
    /// signaled success (numeric 903) but before treating SASL as
    /// trusted. A no-op for PLAIN/EXTERNAL, which have no server-final.
    pub fn verify_server_final(&mut self, server_final: &str) -> Result<(), SessionError> {
        match &mut self.kind {
            SaslKind::Plain { .. } | SaslKind::External { .. } => Ok(()),
            SaslKind::Scram(client) => client
                .verify_server_final(server_final)
                .map_err(|err| SessionError::AuthFailed(err.to_string())),
        }
    }
}

/// Split a base64 `AUTHENTICATE` payload into <=400-byte chunks, per
/// spec.md §4.6: each chunk is sent as its own `AUTHENTICATE <chunk>`
/// line; if the final chunk is exactly 400 bytes long, an extra
/// `AUTHENTICATE +` terminator line is required so the server can tell
/// the payload is finished rather than still arriving.
#[must_use]
pub fn chunk_authenticate_payload(payload: &str) -> Vec<String> {
    if payload.is_empty() {
        return vec!["+".to_owned()];
    }
    let mut chunks: Vec<String> = sasl::chunk_response(payload).map(ToOwned::to_owned).collect();
    if chunks.last().is_some_and(|c| c.len() == SASL_CHUNK_SIZE) {
        chunks.push("+".to_owned());
    }
    chunks
}
