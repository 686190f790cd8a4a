//! SASL authentication helpers for IRC.
//!
//! This module provides utilities for encoding SASL authentication
//! credentials using common mechanisms.
//!
//! # Supported Mechanisms
//!
//! - **PLAIN**: Simple username/password authentication (RFC 4616)
//! - **EXTERNAL**: Certificate-based authentication (client cert)
//!
//! # Reference
//! - IRCv3 SASL: <https://ircv3.net/specs/extensions/sasl-3.2>
//! - RFC 4616 (PLAIN): <https://tools.ietf.org/html/rfc4616>
//!
//! # Example
//!
//! ```
//! use slirc_client::sasl::{SaslMechanism, encode_plain};
//!
//! // Encode PLAIN credentials
//! let encoded = encode_plain("myuser", "mypassword");
//! assert!(!encoded.is_empty());
//!
//! // Check mechanism support
//! let mech = SaslMechanism::parse("PLAIN");
//! assert_eq!(mech, SaslMechanism::Plain);
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// SCRAM-SHA-* mechanism family (RFC 5802/7677), channel binding and the
/// sans-I/O [`scram::ScramClient`] state machine.
pub mod scram;

/// Maximum length of a single SASL message chunk (400 bytes).
///
/// SASL responses that exceed this length must be split into multiple
/// AUTHENTICATE commands.
pub const SASL_CHUNK_SIZE: usize = 400;

/// The SCRAM hash family underlying a `SCRAM-SHA-*` mechanism.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScramHash {
    /// SHA-1 (RFC 5802). Minimum PBKDF2 iteration count 4096.
    Sha1,
    /// SHA-256 (RFC 7677). Minimum PBKDF2 iteration count 4096.
    Sha256,
    /// SHA-512. Minimum PBKDF2 iteration count 10000.
    Sha512,
    /// SHA3-512. Minimum PBKDF2 iteration count 10000.
    Sha3_512,
}

impl ScramHash {
    /// The minimum acceptable PBKDF2 iteration count for this hash family
    /// (spec.md §3 SCRAM state invariants).
    #[must_use]
    pub fn min_iterations(&self) -> u32 {
        match self {
            Self::Sha1 | Self::Sha256 => 4096,
            Self::Sha512 | Self::Sha3_512 => 10000,
        }
    }

    /// Output length in bytes of the underlying hash function.
    #[must_use]
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha512 => 64,
            Self::Sha3_512 => 64,
        }
    }
}

/// Supported SASL authentication mechanisms.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SaslMechanism {
    /// PLAIN mechanism (RFC 4616) - simple username/password.
    Plain,
    /// EXTERNAL mechanism - uses TLS client certificate.
    External,
    /// SCRAM-SHA-* (RFC 5802 / 7677), optionally with channel binding
    /// (the `-PLUS` suffix, `plus: true`).
    Scram {
        /// Which hash family this mechanism name selects.
        hash: ScramHash,
        /// Whether this is the channel-binding (`-PLUS`) variant.
        plus: bool,
    },
    /// Unknown or unsupported mechanism.
    Unknown(String),
}

impl SaslMechanism {
    /// Parse a mechanism name string.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "PLAIN" => Self::Plain,
            "EXTERNAL" => Self::External,
            "SCRAM-SHA-1" => Self::Scram { hash: ScramHash::Sha1, plus: false },
            "SCRAM-SHA-1-PLUS" => Self::Scram { hash: ScramHash::Sha1, plus: true },
            "SCRAM-SHA-256" => Self::Scram { hash: ScramHash::Sha256, plus: false },
            "SCRAM-SHA-256-PLUS" => Self::Scram { hash: ScramHash::Sha256, plus: true },
            "SCRAM-SHA-512" => Self::Scram { hash: ScramHash::Sha512, plus: false },
            "SCRAM-SHA-512-PLUS" => Self::Scram { hash: ScramHash::Sha512, plus: true },
            "SCRAM-SHA-3-512" => Self::Scram { hash: ScramHash::Sha3_512, plus: false },
            "SCRAM-SHA-3-512-PLUS" => Self::Scram { hash: ScramHash::Sha3_512, plus: true },
            _ => Self::Unknown(name.to_owned()),
        }
    }

    /// Returns the canonical name of this mechanism.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain => "PLAIN",
            Self::External => "EXTERNAL",
            Self::Scram { hash, plus } => match (hash, plus) {
                (ScramHash::Sha1, false) => "SCRAM-SHA-1",
                (ScramHash::Sha1, true) => "SCRAM-SHA-1-PLUS",
                (ScramHash::Sha256, false) => "SCRAM-SHA-256",
                (ScramHash::Sha256, true) => "SCRAM-SHA-256-PLUS",
                (ScramHash::Sha512, false) => "SCRAM-SHA-512",
                (ScramHash::Sha512, true) => "SCRAM-SHA-512-PLUS",
                (ScramHash::Sha3_512, false) => "SCRAM-SHA-3-512",
                (ScramHash::Sha3_512, true) => "SCRAM-SHA-3-512-PLUS",
            },
            Self::Unknown(s) => s,
        }
    }

    /// Whether this mechanism name ends in `-PLUS` (requires channel
    /// binding data).
    #[must_use]
    pub fn is_plus(&self) -> bool {
        matches!(self, Self::Scram { plus: true, .. })
    }

    /// Check if this mechanism is supported for encoding.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Plain | Self::External | Self::Scram { .. })
    }
}

/// Inputs available when selecting a SASL mechanism (spec.md §4.5).
#[derive(Clone, Copy, Debug, Default)]
pub struct MechanismContext {
    /// Connection is using TLS (direct or post-STARTTLS).
    pub tls: bool,
    /// A TLS client certificate has been configured.
    pub has_client_cert: bool,
    /// Channel-binding data (`tls-unique`/`tls-server-end-point`/
    /// `tls-exporter`) is obtainable from the TLS session, enabling
    /// `-PLUS` mechanisms.
    pub channel_binding_available: bool,
    /// Operator has explicitly opted in to PLAIN over a non-TLS link.
    pub allow_insecure_plain: bool,
}

/// Enumerate the mechanisms this client is willing to offer, in
/// preference order (spec.md §4.5): `EXTERNAL` (if a client cert is
/// configured over TLS), then the `SCRAM-SHA-*[-PLUS]` family from
/// strongest to weakest, then `PLAIN` (only over TLS unless the operator
/// opts in to insecure PLAIN).
#[must_use]
pub fn preference_order(ctx: &MechanismContext) -> Vec<SaslMechanism> {
    let mut mechs = Vec::new();

    if ctx.tls && ctx.has_client_cert {
        mechs.push(SaslMechanism::External);
    }

    // Fixed order per spec.md §4.5: 512-PLUS, 256-PLUS, 512, 256,
    // 1-PLUS, 1. PLUS variants are only offered when channel-binding data
    // is actually obtainable from the TLS session.
    let ordered = [
        (ScramHash::Sha512, true),
        (ScramHash::Sha256, true),
        (ScramHash::Sha512, false),
        (ScramHash::Sha256, false),
        (ScramHash::Sha1, true),
        (ScramHash::Sha1, false),
    ];
    for (hash, plus) in ordered {
        if plus && !(ctx.tls && ctx.channel_binding_available) {
            continue;
        }
        mechs.push(SaslMechanism::Scram { hash, plus });
    }

    if ctx.tls || ctx.allow_insecure_plain {
        mechs.push(SaslMechanism::Plain);
    }

    mechs
}

/// Select the first mechanism in `preference_order` that the server also
/// advertises in `server_supported`.
#[must_use]
pub fn select_mechanism(
    ctx: &MechanismContext,
    server_supported: &[SaslMechanism],
) -> Option<SaslMechanism> {
    preference_order(ctx)
        .into_iter()
        .find(|m| server_supported.contains(m))
}

impl std::fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a list of mechanisms from a server's `RPL_SASLMECHS` (908) response.
///
/// The mechanisms are typically comma-separated.
///
/// # Example
///
/// ```
/// use slirc_client::sasl::{parse_mechanisms, SaslMechanism};
///
/// let mechs = parse_mechanisms("PLAIN,EXTERNAL,SCRAM-SHA-256");
/// assert!(mechs.contains(&SaslMechanism::Plain));
/// assert!(mechs.contains(&SaslMechanism::External));
/// ```
pub fn parse_mechanisms(list: &str) -> Vec<SaslMechanism> {
    list.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(SaslMechanism::parse)
        .collect()
}

/// Encode credentials for the PLAIN mechanism.
///
/// The PLAIN mechanism encodes: `authzid NUL authcid NUL password`
///
/// For IRC SASL, `authzid` is typically empty and `authcid` is the username.
///
/// # Arguments
///
/// * `username` - The authentication identity (authcid)
/// * `password` - The password
///
/// # Returns
///
/// Base64-encoded PLAIN authentication string.
///
/// # Example
///
/// ```
/// use slirc_client::sasl::encode_plain;
///
/// let encoded = encode_plain("testuser", "testpass");
/// // Decodes to: "\0testuser\0testpass"
/// assert!(!encoded.is_empty());
/// ```
pub fn encode_plain(username: &str, password: &str) -> String {
    // Format: authzid NUL authcid NUL password
    // For IRC, authzid is typically empty
    let payload = format!("\0{}\0{}", username, password);
    BASE64.encode(payload.as_bytes())
}

/// Encode credentials for the PLAIN mechanism with an explicit authzid.
///
/// Use this when you need to authenticate as one user but authorize as another.
///
/// # Arguments
///
/// * `authzid` - The authorization identity (who to act as)
/// * `authcid` - The authentication identity (who is authenticating)
/// * `password` - The password
pub fn encode_plain_with_authzid(authzid: &str, authcid: &str, password: &str) -> String {
    let payload = format!("{}\0{}\0{}", authzid, authcid, password);
    BASE64.encode(payload.as_bytes())
}

/// Encode an EXTERNAL mechanism response.
///
/// For EXTERNAL, the response is typically empty ("+") or contains
/// the authorization identity if different from the certificate CN.
///
/// # Arguments
///
/// * `authzid` - Optional authorization identity. Pass `None` for default.
pub fn encode_external(authzid: Option<&str>) -> String {
    match authzid {
        Some(id) if !id.is_empty() => BASE64.encode(id.as_bytes()),
        _ => "+".to_owned(), // Empty response
    }
}

/// Split an encoded SASL response into chunks for transmission.
///
/// IRC SASL requires responses longer than 400 bytes to be split
/// across multiple AUTHENTICATE commands.
///
/// # Example
///
/// ```
/// use slirc_client::sasl::chunk_response;
///
/// let response = "a]".repeat(250); // Long response
/// let chunks: Vec<_> = chunk_response(&response).collect();
/// assert!(chunks.len() > 1);
/// for chunk in &chunks[..chunks.len()-1] {
///     assert_eq!(chunk.len(), 400);
/// }
/// ```
pub fn chunk_response(encoded: &str) -> impl Iterator<Item = &str> {
    encoded.as_bytes().chunks(SASL_CHUNK_SIZE).map(|chunk| {
        // Safe because base64 is always ASCII
        std::str::from_utf8(chunk).unwrap()
    })
}

/// Check if a SASL response needs chunking.
#[inline]
pub fn needs_chunking(encoded: &str) -> bool {
    encoded.len() > SASL_CHUNK_SIZE
}

/// Decode a base64-encoded SASL challenge or response.
///
/// # Returns
///
/// The decoded bytes, or an error if decoding fails.
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    if encoded == "+" {
        return Ok(Vec::new());
    }
    BASE64.decode(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_plain() {
        let encoded = encode_plain("testuser", "testpass");
        let decoded = BASE64.decode(&encoded).unwrap();
        assert_eq!(decoded, b"\0testuser\0testpass");
    }

    #[test]
    fn test_encode_plain_with_authzid() {
        let encoded = encode_plain_with_authzid("admin", "testuser", "testpass");
        let decoded = BASE64.decode(&encoded).unwrap();
        assert_eq!(decoded, b"admin\0testuser\0testpass");
    }

    #[test]
    fn test_encode_external_empty() {
        let encoded = encode_external(None);
        assert_eq!(encoded, "+");
    }

    #[test]
    fn test_encode_external_with_authzid() {
        let encoded = encode_external(Some("myuser"));
        let decoded = BASE64.decode(&encoded).unwrap();
        assert_eq!(decoded, b"myuser");
    }

    #[test]
    fn test_parse_mechanisms() {
        let mechs = parse_mechanisms("PLAIN,EXTERNAL,SCRAM-SHA-256");
        assert_eq!(mechs.len(), 3);
        assert!(mechs.contains(&SaslMechanism::Plain));
        assert!(mechs.contains(&SaslMechanism::External));
        assert!(mechs.contains(&SaslMechanism::Scram { hash: ScramHash::Sha256, plus: false }));
    }

    #[test]
    fn test_chunk_response_short() {
        let short = "abc123";
        let chunks: Vec<_> = chunk_response(short).collect();
        assert_eq!(chunks, vec!["abc123"]);
    }

    #[test]
    fn test_chunk_response_long() {
        let long = "a".repeat(500);
        let chunks: Vec<_> = chunk_response(&long).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 400);
        assert_eq!(chunks[1].len(), 100);
    }

    #[test]
    fn test_needs_chunking() {
        assert!(!needs_chunking("short"));
        assert!(needs_chunking(&"a".repeat(500)));
    }

    #[test]
    fn test_decode_base64_empty() {
        let decoded = decode_base64("+").unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_decode_base64_valid() {
        let encoded = BASE64.encode(b"hello");
        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, b"hello");
    }

    #[test]
    fn test_mechanism_parse() {
        assert_eq!(SaslMechanism::parse("PLAIN"), SaslMechanism::Plain);
        assert_eq!(SaslMechanism::parse("plain"), SaslMechanism::Plain);
        assert_eq!(SaslMechanism::parse("EXTERNAL"), SaslMechanism::External);
        assert_eq!(
            SaslMechanism::parse("SCRAM-SHA-256"),
            SaslMechanism::Scram { hash: ScramHash::Sha256, plus: false }
        );
        assert_eq!(
            SaslMechanism::parse("UNKNOWN"),
            SaslMechanism::Unknown("UNKNOWN".to_owned())
        );
    }

    #[test]
    fn test_mechanism_as_str() {
        assert_eq!(SaslMechanism::Plain.as_str(), "PLAIN");
        assert_eq!(SaslMechanism::External.as_str(), "EXTERNAL");
        assert_eq!(SaslMechanism::Scram { hash: ScramHash::Sha256, plus: false }.as_str(), "SCRAM-SHA-256");
    }

    #[test]
    fn test_mechanism_is_supported() {
        assert!(SaslMechanism::Plain.is_supported());
        assert!(SaslMechanism::External.is_supported());
        assert!(SaslMechanism::Scram { hash: ScramHash::Sha256, plus: false }.is_supported());
        assert!(!SaslMechanism::Unknown("FOO".to_owned()).is_supported());
    }

    #[test]
    fn test_preference_order_matches_spec_sequence() {
        let ctx = MechanismContext {
            tls: true,
            has_client_cert: true,
            channel_binding_available: true,
            allow_insecure_plain: false,
        };
        let order: Vec<_> = preference_order(&ctx).iter().map(|m| m.as_str().to_owned()).collect();
        assert_eq!(
            order,
            vec![
                "EXTERNAL",
                "SCRAM-SHA-512-PLUS",
                "SCRAM-SHA-256-PLUS",
                "SCRAM-SHA-512",
                "SCRAM-SHA-256",
                "SCRAM-SHA-1-PLUS",
                "SCRAM-SHA-1",
                "PLAIN",
            ]
        );
    }

    #[test]
    fn test_preference_order_no_plain_without_tls_or_optin() {
        let ctx = MechanismContext::default();
        let order = preference_order(&ctx);
        assert!(!order.contains(&SaslMechanism::Plain));
    }

    #[test]
    fn test_select_mechanism_picks_first_server_supported() {
        let ctx = MechanismContext { tls: true, ..Default::default() };
        let server_supported = parse_mechanisms("PLAIN,SCRAM-SHA-256");
        assert_eq!(
            select_mechanism(&ctx, &server_supported),
            Some(SaslMechanism::Scram { hash: ScramHash::Sha256, plus: false })
        );
    }

}
