//! Per-bot configuration (spec.md §6 "Configuration (per-bot)").
//!
//! Plain data only — loading these structs from TOML/env/CLI args is an
//! explicit Non-goal (spec.md §1: "CLI entry points, logging setup,
//! configuration loading" are external collaborators). The session state
//! machine consumes a [`BotConfig`] built however the embedding
//! application sees fit.

use std::time::Duration;

/// One server in a bot's server list (spec.md §6 "Server list").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl ServerConfig {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, tls: bool) -> Self {
        Self {
            host: host.into(),
            port,
            tls,
        }
    }
}

/// A configured channel to auto-join, optionally with a key
/// (spec.md §6 `"#name"` or `"#name key"` strings).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub key: Option<String>,
}

impl ChannelSpec {
    /// Parse one `"#name"` or `"#name key"` configuration string.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        match spec.split_once(' ') {
            Some((name, key)) => Self {
                name: name.to_owned(),
                key: Some(key.to_owned()),
            },
            None => Self {
                name: spec.to_owned(),
                key: None,
            },
        }
    }
}

/// `/OPER`/`/CHALLENGE` credentials (spec.md §6, §4.6).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperConfig {
    pub oper_name: Option<String>,
    pub oper_password: Option<String>,
    pub challenge_key_file: Option<String>,
    pub challenge_key_password: Option<String>,
    /// Best-effort, templated services-OPER path (spec.md §4.6): the
    /// literal `{password}` placeholder is substituted by the session
    /// before sending.
    pub service_oper_password: Option<String>,
    pub service_oper_command: Option<String>,
}

/// SASL/account authentication configuration (spec.md §6, §4.5).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaslConfig {
    pub account_name: Option<String>,
    pub account_password: Option<String>,
    pub account_certificate_file: Option<String>,
    pub impersonate_account: Option<String>,
    pub allow_insecure_sasl_plain: bool,
}

impl SaslConfig {
    /// Whether any SASL credential is configured at all (i.e. the session
    /// should request the `sasl` capability).
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.account_name.is_some() || self.account_certificate_file.is_some()
    }
}

/// Dispatcher permission grants (spec.md §6 `permissions`): account name
/// to the list of permission strings it holds.
pub type PermissionTable = std::collections::HashMap<String, Vec<String>>;

/// Top-level per-bot configuration (spec.md §6).
#[derive(Clone, Debug)]
pub struct BotConfig {
    pub servers: Vec<ServerConfig>,
    pub channels: Vec<ChannelSpec>,
    pub oper: OperConfig,
    pub sasl: SaslConfig,
    pub join_timeout: Duration,
    pub command_prefix: String,
    pub permissions: PermissionTable,
    /// The nickname requested via `NICK` during registration.
    pub nick: String,
    /// `USER` ident/realname fields.
    pub ident: String,
    pub realname: String,
    /// Optional server password (`PASS`), distinct from SASL/account
    /// credentials.
    pub server_password: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            channels: Vec::new(),
            oper: OperConfig::default(),
            sasl: SaslConfig::default(),
            join_timeout: Duration::from_millis(30_000),
            command_prefix: "!".to_owned(),
            permissions: PermissionTable::new(),
            nick: String::new(),
            ident: String::new(),
            realname: String::new(),
            server_password: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_join_timeout_is_thirty_seconds() {
        assert_eq!(BotConfig::default().join_timeout, Duration::from_millis(30_000));
    }

    #[test]
    fn default_command_prefix_is_bang() {
        assert_eq!(BotConfig::default().command_prefix, "!");
    }

    #[test]
    fn channel_spec_parses_name_and_key() {
        let spec = ChannelSpec::parse("#chan secretkey");
        assert_eq!(spec.name, "#chan");
        assert_eq!(spec.key.as_deref(), Some("secretkey"));

        let spec = ChannelSpec::parse("#chan");
        assert_eq!(spec.name, "#chan");
        assert!(spec.key.is_none());
    }

    #[test]
    fn sasl_config_not_configured_by_default() {
        assert!(!SaslConfig::default().is_configured());
    }
}
