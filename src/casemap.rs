
//! IRC casefolding.
//!
//! IRC defines several conventions for case-insensitive nick/channel
//! comparison, negotiated per-network via `ISUPPORT CASEMAPPING`. The
//! default `irc_to_lower`/`irc_eq` free functions below implement the
//! classic RFC 1459 mapping; [`CaseMapping`] generalizes over the full set
//! a network may advertise.

/// A network's negotiated casefolding convention (`ISUPPORT CASEMAPPING`).
///
/// Lookups in the network state store key on the folded form produced by
/// the active mapping; switching mappings mid-session requires rekeying
/// every existing entry (see `netstate::NetworkState::set_case_mapping`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum CaseMapping {
    /// Plain ASCII case folding: only `A-Z` maps to `a-z`.
    Ascii,
    /// RFC 1459: ASCII plus `{}|^` as the lowercase forms of `[]\~`.
    #[default]
    Rfc1459,
    /// The "strict" RFC 1459 variant: like `Rfc1459` but without folding
    /// `~` to `^` (some servers advertise this to avoid folding the tilde).
    Rfc1459Strict,
    /// RFC 7613 (PRECIS) based folding, used by some modern servers:
    /// effectively ASCII-only folding over the already-enforced PRECIS
    /// nickname profile.
    Rfc7613,
}

impl CaseMapping {
    /// Parse an `ISUPPORT CASEMAPPING` token value.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "ascii" => Some(Self::Ascii),
            "rfc1459" => Some(Self::Rfc1459),
            "rfc1459-strict" => Some(Self::Rfc1459Strict),
            "rfc7613" => Some(Self::Rfc7613),
            _ => None,
        }
    }

    /// The canonical `ISUPPORT` token name for this mapping.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::Rfc1459 => "rfc1459",
            Self::Rfc1459Strict => "rfc1459-strict",
            Self::Rfc7613 => "rfc7613",
        }
    }

    /// Fold a single character per this mapping's rules.
    #[must_use]
    pub fn fold_char(&self, c: char) -> char {
        match self {
            Self::Ascii | Self::Rfc7613 => {
                if c.is_ascii_uppercase() {
                    c.to_ascii_lowercase()
                } else {
                    c
                }
            }
            Self::Rfc1459 => match c {
                '[' => '{',
                ']' => '}',
                '\\' => '|',
                '~' => '^',
                'A'..='Z' => c.to_ascii_lowercase(),
                _ => c,
            },
            Self::Rfc1459Strict => match c {
                '[' => '{',
                ']' => '}',
                '\\' => '|',
                'A'..='Z' => c.to_ascii_lowercase(),
                _ => c,
            },
        }
    }

    /// Fold a whole string, producing the canonical key used for
    /// case-insensitive lookups (nick/channel comparisons, store keys).
    ///
    /// `Rfc7613` folds the full string through Unicode simple case
    /// folding (`str::to_lowercase`) rather than per-character ASCII
    /// folding, matching common real-world RFC 7613 client behavior;
    /// the other mappings fold character-by-character.
    #[must_use]
    pub fn fold(&self, s: &str) -> String {
        match self {
            Self::Rfc7613 => s.to_lowercase(),
            _ => s.chars().map(|c| self.fold_char(c)).collect(),
        }
    }

    /// Case-insensitive equality under this mapping.
    #[must_use]
    pub fn eq(&self, a: &str, b: &str) -> bool {
        if *self != Self::Rfc7613 && a.len() != b.len() {
            // Folding never changes a character's UTF-8 byte length for
            // the ASCII-range substitutions the other mappings make, so
            // differing byte lengths can short-circuit. `Rfc7613`'s full
            // Unicode lowercasing can change length (e.g. 'İ'), so it
            // always falls through to the full comparison below.
            return false;
        }
        self.fold(a) == self.fold(b)
    }
}

pub fn irc_to_lower(s: &str) -> String {
    s.chars()
        .map(|c| match c {

            '[' => '{',
            ']' => '}',
            '\\' => '|',
            '~' => '^',
            
            'A'..='Z' => c.to_ascii_lowercase(),
            
            _ => c,
        })
        .collect()
}

pub fn irc_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.chars().zip(b.chars()).all(|(ca, cb)| {
        let ca_lower = match ca {
            '[' => '{',
            ']' => '}',
            '\\' => '|',
            '~' => '^',
            'A'..='Z' => ca.to_ascii_lowercase(),
            _ => ca,
        };
        let cb_lower = match cb {
            '[' => '{',
            ']' => '}',
            '\\' => '|',
            '~' => '^',
            'A'..='Z' => cb.to_ascii_lowercase(),
            _ => cb,
        };
        ca_lower == cb_lower
    })
}

