//! SCRAM SASL mechanism family (RFC 5802 / RFC 7677), including the
//! `-PLUS` channel-binding variants over SHA-1/256/512/3-512.
//!
//! # SCRAM Protocol Flow
//!
//! 1. Client sends `client-first-message`: gs2-header + `n=user,r=nonce`
//! 2. Server sends `server-first-message`: `r=nonce+server,s=salt,i=iterations`
//! 3. Client sends `client-final-message`: `c=cbind,r=nonce+server,p=proof`
//! 4. Server sends `server-final-message`: `v=verifier` (or `e=error`)
//!
//! # Reference
//! - RFC 5802: <https://tools.ietf.org/html/rfc5802>
//! - RFC 7677: <https://tools.ietf.org/html/rfc7677>
//! - RFC 5801 (GS2): <https://tools.ietf.org/html/rfc5801>

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use zeroize::Zeroizing;

use super::{decode_base64, ScramHash};

/// Which TLS channel-binding data source backs a `p=` GS2 flag.
///
/// Selection priority when more than one is available (spec.md §4.5):
/// exporter > unique > endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CBindType {
    /// RFC 9266 `tls-exporter`.
    Exporter,
    /// `tls-unique` (legacy TLS 1.2 and earlier).
    Unique,
    /// RFC 5929 `tls-server-end-point`.
    ServerEndpoint,
}

impl CBindType {
    /// The GS2 `p=` token name for this binding source.
    #[must_use]
    pub fn token(&self) -> &'static str {
        match self {
            Self::Exporter => "tls-exporter",
            Self::Unique => "tls-unique",
            Self::ServerEndpoint => "tls-server-end-point",
        }
    }

    /// Pick the highest-priority binding type out of whichever sources a
    /// TLS session happens to expose.
    #[must_use]
    pub fn select(
        exporter: Option<Vec<u8>>,
        unique: Option<Vec<u8>>,
        endpoint: Option<Vec<u8>>,
    ) -> Option<(Self, Vec<u8>)> {
        exporter
            .map(|d| (Self::Exporter, d))
            .or_else(|| unique.map(|d| (Self::Unique, d)))
            .or_else(|| endpoint.map(|d| (Self::ServerEndpoint, d)))
    }
}

/// The GS2 channel-binding posture for a single SCRAM run.
#[derive(Clone, Debug)]
pub enum ChannelBinding {
    /// No TLS in use (or binding deliberately unsupported). GS2 flag `n`.
    Unsupported,
    /// Non-PLUS mechanism over TLS: the client supports channel binding
    /// but the server didn't offer a `-PLUS` variant. GS2 flag `y`; this
    /// protects against a downstream downgrade attack being silently
    /// accepted.
    NotRequested,
    /// `-PLUS` variant: channel-binding bytes obtained from the live TLS
    /// session. GS2 flag `p=<kind>`.
    Required {
        /// Which binding source the bytes came from.
        kind: CBindType,
        /// The raw channel-binding data (certificate hash, TLS exporter
        /// output, etc.) appended verbatim to the GS2 header in `cbind-input`.
        data: Vec<u8>,
    },
}

impl ChannelBinding {
    fn gs2_flag(&self) -> String {
        match self {
            Self::Unsupported => "n".to_owned(),
            Self::NotRequested => "y".to_owned(),
            Self::Required { kind, .. } => format!("p={}", kind.token()),
        }
    }

    fn cbind_data(&self) -> &[u8] {
        match self {
            Self::Required { data, .. } => data,
            _ => &[],
        }
    }
}

/// An MFA extension exchanged as `t=<name>,f=<token>` on the client-final
/// message after the server challenges with `l=` in server-first
/// (spec.md §3 SCRAM state: "optional MFA challenge").
#[derive(Clone, Debug)]
pub struct MfaCredential {
    /// Name of the second factor (server-defined).
    pub name: String,
    /// The one-time token/response for this factor.
    pub token: String,
}

/// Internal state of a SCRAM authentication attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScramState {
    /// Initial state.
    Initial,
    /// Sent client-first, awaiting server-first.
    ClientFirstSent,
    /// Received server-first, ready to send client-final.
    ServerFirstReceived {
        /// Combined nonce (client + server).
        nonce: String,
        /// Salt from server (base64 decoded).
        salt: Vec<u8>,
        /// Iteration count.
        iterations: u32,
        /// Server-supplied MFA challenge (`l=`), if any.
        mfa_challenge: Option<String>,
    },
    /// Sent client-final, awaiting server-final.
    ClientFinalSent,
    /// Authentication complete.
    Complete,
    /// Authentication failed.
    Failed(String),
}

/// A single SCRAM authentication attempt's state (spec.md §3 "SCRAM
/// state"). Dropped (and its password zeroized) after completion or
/// failure.
#[derive(Debug)]
pub struct ScramClient {
    hash: ScramHash,
    username: String,
    authzid: Option<String>,
    password: Zeroizing<String>,
    client_nonce: String,
    gs2_header: String,
    channel_binding: ChannelBinding,
    mfa: Option<MfaCredential>,
    client_first_bare: String,
    server_first_raw: String,
    expected_server_signature: Option<Vec<u8>>,
    state: ScramState,
}

impl ScramClient {
    /// Create a new SCRAM client attempt.
    ///
    /// `username`/`password` are run through SASLprep (RFC 4013)
    /// normalization; `username` and `authzid` additionally have `=` and
    /// `,` escaped to `=3D`/`=2C` per RFC 5802's `saslname` grammar.
    pub fn new(
        hash: ScramHash,
        username: &str,
        password: &str,
        authzid: Option<&str>,
        channel_binding: ChannelBinding,
        mfa: Option<MfaCredential>,
    ) -> Result<Self, ScramError> {
        let username = escape_saslname(&saslprep(username)?);
        let authzid = authzid
            .filter(|a| !a.is_empty())
            .map(|a| Ok::<_, ScramError>(escape_saslname(&saslprep(a)?)))
            .transpose()?;
        let password = Zeroizing::new(saslprep(password)?.into_owned());
        let client_nonce = generate_nonce()?;
        let gs2_header = format!(
            "{},{},",
            channel_binding.gs2_flag(),
            authzid
                .as_ref()
                .map(|a| format!("a={a}"))
                .unwrap_or_default()
        );

        Ok(Self {
            hash,
            username,
            authzid,
            password,
            client_nonce,
            gs2_header,
            channel_binding,
            mfa,
            client_first_bare: String::new(),
            server_first_raw: String::new(),
            expected_server_signature: None,
            state: ScramState::Initial,
        })
    }

    /// The current state of this attempt.
    #[must_use]
    pub fn state(&self) -> &ScramState {
        &self.state
    }

    /// Build the `client-first-message` (GS2 header + bare message),
    /// base64-encoded and ready for `AUTHENTICATE`.
    #[must_use]
    pub fn client_first_message(&mut self) -> String {
        let bare = format!("n={},r={}", self.username, self.client_nonce);
        self.client_first_bare = bare.clone();
        self.state = ScramState::ClientFirstSent;
        BASE64.encode(format!("{}{}", self.gs2_header, bare).into_bytes())
    }

    /// Process the base64-encoded `server-first-message` and produce the
    /// base64-encoded `client-final-message`.
    pub fn process_server_first(&mut self, server_first: &str) -> Result<String, ScramError> {
        let decoded = decode_base64(server_first).map_err(|_| ScramError::InvalidEncoding)?;
        let message = String::from_utf8(decoded).map_err(|_| ScramError::InvalidEncoding)?;
        self.server_first_raw = message.clone();

        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;
        let mut mfa_challenge = None;

        for part in message.split(',') {
            if part.starts_with("m=") {
                self.state = ScramState::Failed("mandatory extension not supported".to_owned());
                return Err(ScramError::MandatoryExtension);
            } else if let Some(value) = part.strip_prefix("r=") {
                nonce = Some(value.to_owned());
            } else if let Some(value) = part.strip_prefix("s=") {
                salt = Some(decode_base64(value).map_err(|_| ScramError::InvalidEncoding)?);
            } else if let Some(value) = part.strip_prefix("i=") {
                iterations = Some(value.parse().map_err(|_| ScramError::InvalidIterations)?);
            } else if let Some(value) = part.strip_prefix("l=") {
                mfa_challenge = Some(value.to_owned());
            }
            // Any other unrecognized extension is ignored per RFC 5802 §3.
        }

        let nonce = nonce.ok_or(ScramError::MissingNonce)?;
        let salt = salt.ok_or(ScramError::MissingSalt)?;
        let iterations = iterations.ok_or(ScramError::MissingIterations)?;

        if salt.is_empty() {
            return Err(ScramError::MissingSalt);
        }
        if !nonce.starts_with(&self.client_nonce) || nonce.len() <= self.client_nonce.len() {
            self.state = ScramState::Failed("server nonce does not extend client nonce".to_owned());
            return Err(ScramError::NonceMismatch);
        }
        if iterations < self.hash.min_iterations() {
            return Err(ScramError::InvalidIterations);
        }

        self.state = ScramState::ServerFirstReceived {
            nonce: nonce.clone(),
            salt: salt.clone(),
            iterations,
            mfa_challenge,
        };

        self.compute_client_final(&nonce, &salt, iterations)
    }

    fn compute_client_final(
        &mut self,
        nonce: &str,
        salt: &[u8],
        iterations: u32,
    ) -> Result<String, ScramError> {
        let salted_password = hi(self.hash, self.password.as_bytes(), salt, iterations);
        let client_key = hmac_bytes(self.hash, &salted_password, b"Client Key");
        let stored_key = hash_bytes(self.hash, &client_key);

        let mut cbind_input = self.gs2_header.clone().into_bytes();
        cbind_input.extend_from_slice(self.channel_binding.cbind_data());

        let mfa_fields = match &self.mfa {
            Some(mfa) => format!(",t={},f={}", mfa.name, mfa.token),
            None => String::new(),
        };
        let client_final_without_proof =
            format!("c={},r={}{}", BASE64.encode(&cbind_input), nonce, mfa_fields);

        let auth_message = format!(
            "{},{},{}",
            self.client_first_bare, self.server_first_raw, client_final_without_proof
        );

        let client_signature = hmac_bytes(self.hash, &stored_key, auth_message.as_bytes());
        let client_proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(a, b)| a ^ b)
            .collect();

        let server_key = hmac_bytes(self.hash, &salted_password, b"Server Key");
        self.expected_server_signature =
            Some(hmac_bytes(self.hash, &server_key, auth_message.as_bytes()));

        let client_final = format!(
            "{},p={}",
            client_final_without_proof,
            BASE64.encode(&client_proof)
        );
        self.state = ScramState::ClientFinalSent;

        let _ = iterations; // only used to satisfy the signature above
        Ok(BASE64.encode(client_final.into_bytes()))
    }

    /// Process the base64-encoded `server-final-message`. Succeeds only
    /// if the embedded `v=` signature matches the one computed during
    /// [`process_server_first`](Self::process_server_first).
    pub fn verify_server_final(&mut self, server_final: &str) -> Result<(), ScramError> {
        let decoded = decode_base64(server_final).map_err(|_| ScramError::InvalidEncoding)?;
        let message = String::from_utf8(decoded).map_err(|_| ScramError::InvalidEncoding)?;

        if let Some(err) = message.strip_prefix("e=") {
            self.state = ScramState::Failed(err.to_owned());
            return Err(ScramError::ServerRejected(err.to_owned()));
        }

        let verifier = message
            .strip_prefix("v=")
            .ok_or(ScramError::ServerVerificationFailed)?;
        let server_sig = decode_base64(verifier).map_err(|_| ScramError::InvalidEncoding)?;

        let expected = self
            .expected_server_signature
            .as_ref()
            .ok_or(ScramError::ServerVerificationFailed)?;

        // Constant-time comparison of the server's proof.
        use subtle::ConstantTimeEq;
        if server_sig.ct_eq(expected).into() {
            self.state = ScramState::Complete;
            Ok(())
        } else {
            self.state = ScramState::Failed("server verification failed".to_owned());
            Err(ScramError::ServerVerificationFailed)
        }
    }

    /// The username as it will be sent on the wire (after SASLprep and
    /// `saslname` escaping).
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The authzid as it will be sent on the wire, if any.
    #[must_use]
    pub fn authzid(&self) -> Option<&str> {
        self.authzid.as_deref()
    }
}

/// Errors that can occur during SCRAM authentication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScramError {
    /// Base64 decoding failed.
    InvalidEncoding,
    /// Server nonce doesn't begin with, or fails to strictly extend, the
    /// client nonce.
    NonceMismatch,
    /// Missing nonce in server message.
    MissingNonce,
    /// Missing or empty salt in server message.
    MissingSalt,
    /// Missing iteration count in server message.
    MissingIterations,
    /// Iteration count below the hash family's minimum, or unparsable.
    InvalidIterations,
    /// The server's final signature didn't match the expected value.
    ServerVerificationFailed,
    /// The server rejected the attempt with an `e=` error token.
    ServerRejected(String),
    /// Server-first advertised a mandatory (`m=`) extension this client
    /// doesn't understand; SCRAM requires immediate failure.
    MandatoryExtension,
    /// Input normalization (SASLprep) rejected a prohibited character.
    Normalization(String),
}

impl std::fmt::Display for ScramError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEncoding => write!(f, "invalid base64 encoding"),
            Self::NonceMismatch => write!(f, "server nonce doesn't extend client nonce"),
            Self::MissingNonce => write!(f, "missing nonce in server message"),
            Self::MissingSalt => write!(f, "missing or empty salt in server message"),
            Self::MissingIterations => write!(f, "missing iteration count"),
            Self::InvalidIterations => write!(f, "invalid or insufficient iteration count"),
            Self::ServerVerificationFailed => write!(f, "server verification failed"),
            Self::ServerRejected(e) => write!(f, "server rejected authentication: {e}"),
            Self::MandatoryExtension => write!(f, "server requires an unsupported mandatory extension"),
            Self::Normalization(s) => write!(f, "SASLprep normalization failed: {s}"),
        }
    }
}

impl std::error::Error for ScramError {}

// ============================================================================
// Cryptographic primitives, one module per hash family (avoids generic
// trait-bound gymnastics over hmac::Hmac<D>/pbkdf2 for four distinct
// digest types).
// ============================================================================

macro_rules! impl_scram_hash_family {
    ($module:ident, $digest:ty) => {
        mod $module {
            use hmac::{Hmac, Mac};
            use digest::Digest;

            pub fn hi(password: &[u8], salt: &[u8], iterations: u32, out_len: usize) -> Vec<u8> {
                let mut out = vec![0u8; out_len];
                pbkdf2::pbkdf2::<Hmac<$digest>>(password, salt, iterations, &mut out)
                    .expect("HMAC can be initialized with any key length");
                out
            }

            pub fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
                let mut mac = Hmac::<$digest>::new_from_slice(key)
                    .expect("HMAC can be initialized with any key length");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }

            pub fn hash(data: &[u8]) -> Vec<u8> {
                let mut h = <$digest>::new();
                h.update(data);
                h.finalize().to_vec()
            }
        }
    };
}

impl_scram_hash_family!(sha1_family, sha1::Sha1);
impl_scram_hash_family!(sha256_family, sha2::Sha256);
impl_scram_hash_family!(sha512_family, sha2::Sha512);
impl_scram_hash_family!(sha3_512_family, sha3::Sha3_512);

fn hi(hash: ScramHash, password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    let out_len = hash.output_len();
    match hash {
        ScramHash::Sha1 => sha1_family::hi(password, salt, iterations, out_len),
        ScramHash::Sha256 => sha256_family::hi(password, salt, iterations, out_len),
        ScramHash::Sha512 => sha512_family::hi(password, salt, iterations, out_len),
        ScramHash::Sha3_512 => sha3_512_family::hi(password, salt, iterations, out_len),
    }
}

fn hmac_bytes(hash: ScramHash, key: &[u8], data: &[u8]) -> Vec<u8> {
    match hash {
        ScramHash::Sha1 => sha1_family::hmac(key, data),
        ScramHash::Sha256 => sha256_family::hmac(key, data),
        ScramHash::Sha512 => sha512_family::hmac(key, data),
        ScramHash::Sha3_512 => sha3_512_family::hmac(key, data),
    }
}

fn hash_bytes(hash: ScramHash, data: &[u8]) -> Vec<u8> {
    match hash {
        ScramHash::Sha1 => sha1_family::hash(data),
        ScramHash::Sha256 => sha256_family::hash(data),
        ScramHash::Sha512 => sha512_family::hash(data),
        ScramHash::Sha3_512 => sha3_512_family::hash(data),
    }
}

/// Escape `=` and `,` per RFC 5802's `saslname` grammar. `=` must be
/// escaped first so the escape sequence for `,` doesn't get re-escaped.
fn escape_saslname(s: &str) -> String {
    s.replace('=', "=3D").replace(',', "=2C")
}

/// SASLprep (RFC 4013) normalization, via the `stringprep` PRECIS
/// profile implementation.
fn saslprep(s: &str) -> Result<std::borrow::Cow<'_, str>, ScramError> {
    stringprep::saslprep(s).map_err(|e| ScramError::Normalization(format!("{e:?}")))
}

/// Generate a SCRAM client nonce: 128 random bits, base64-encoded.
fn generate_nonce() -> Result<String, ScramError> {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| ScramError::Normalization(format!("rng failure: {e}")))?;
    Ok(BASE64.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with_nonce(hash: ScramHash, nonce: &str) -> ScramClient {
        let mut c = ScramClient::new(hash, "user", "pencil", None, ChannelBinding::Unsupported, None)
            .unwrap();
        c.client_nonce = nonce.to_owned();
        c
    }

    #[test]
    fn client_first_message_format() {
        let mut client = client_with_nonce(ScramHash::Sha256, "rOprNGfwEbeRWgbNEkqO");
        let first = client.client_first_message();
        let decoded = String::from_utf8(BASE64.decode(&first).unwrap()).unwrap();
        assert_eq!(decoded, "n,,n=user,r=rOprNGfwEbeRWgbNEkqO");
    }

    /// RFC 7677 §3 test vector.
    #[test]
    fn scram_sha256_rfc7677_vector() {
        let mut client = client_with_nonce(ScramHash::Sha256, "rOprNGfwEbeRWgbNEkqO");
        let client_first = client.client_first_message();
        assert_eq!(
            String::from_utf8(BASE64.decode(&client_first).unwrap()).unwrap(),
            "n,,n=user,r=rOprNGfwEbeRWgbNEkqO"
        );

        let server_first = BASE64.encode(
            b"r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096",
        );
        let client_final = client.process_server_first(&server_first).unwrap();
        let decoded_final = String::from_utf8(BASE64.decode(&client_final).unwrap()).unwrap();

        assert!(decoded_final
            .starts_with("c=biws,r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,p="));
        let proof = decoded_final.split(",p=").nth(1).unwrap();
        assert_eq!(proof, "dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ=");

        let server_final = BASE64.encode(b"v=6rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4=");
        client.verify_server_final(&server_final).unwrap();
        assert_eq!(client.state(), &ScramState::Complete);
    }

    #[test]
    fn rejects_nonce_that_does_not_extend_client_nonce() {
        let mut client = client_with_nonce(ScramHash::Sha256, "rOprNGfwEbeRWgbNEkqO");
        let _ = client.client_first_message();
        let bad = BASE64.encode(b"r=totallydifferent,s=QSXCR+Q6sek8bf92,i=4096");
        assert_eq!(
            client.process_server_first(&bad).unwrap_err(),
            ScramError::NonceMismatch
        );
    }

    #[test]
    fn rejects_iterations_below_minimum() {
        let mut client = client_with_nonce(ScramHash::Sha256, "rOprNGfwEbeRWgbNEkqO");
        let _ = client.client_first_message();
        let bad = BASE64.encode(
            b"r=rOprNGfwEbeRWgbNEkqOserver,s=QSXCR+Q6sek8bf92,i=1",
        );
        assert_eq!(
            client.process_server_first(&bad).unwrap_err(),
            ScramError::InvalidIterations
        );
    }

    #[test]
    fn rejects_mandatory_extension() {
        let mut client = client_with_nonce(ScramHash::Sha256, "rOprNGfwEbeRWgbNEkqO");
        let _ = client.client_first_message();
        let bad = BASE64.encode(
            b"m=unsupported,r=rOprNGfwEbeRWgbNEkqOserver,s=QSXCR+Q6sek8bf92,i=4096",
        );
        assert_eq!(
            client.process_server_first(&bad).unwrap_err(),
            ScramError::MandatoryExtension
        );
    }

    #[test]
    fn gs2_header_includes_authzid() {
        let client = ScramClient::new(
            ScramHash::Sha256,
            "user",
            "pencil",
            Some("admin"),
            ChannelBinding::Unsupported,
            None,
        )
        .unwrap();
        assert_eq!(client.gs2_header, "n,a=admin,");
    }

    #[test]
    fn gs2_header_plus_variant_sets_p_flag() {
        let client = ScramClient::new(
            ScramHash::Sha256,
            "user",
            "pencil",
            None,
            ChannelBinding::Required {
                kind: CBindType::Exporter,
                data: vec![1, 2, 3],
            },
            None,
        )
        .unwrap();
        assert_eq!(client.gs2_header, "p=tls-exporter,,");
    }

    #[test]
    fn escapes_equals_and_comma_in_names() {
        assert_eq!(escape_saslname("a=b,c"), "a=3Db=2Cc");
    }

    #[test]
    fn different_hash_families_yield_different_min_iterations() {
        assert_eq!(ScramHash::Sha1.min_iterations(), 4096);
        assert_eq!(ScramHash::Sha256.min_iterations(), 4096);
        assert_eq!(ScramHash::Sha512.min_iterations(), 10000);
        assert_eq!(ScramHash::Sha3_512.min_iterations(), 10000);
    }
}
