//! Session lifecycle (spec.md §4.5/§4.6): the sans-IO [`machine`], SASL
//! mechanism stepping in [`sasl_driver`], the deferred-send/reply-matching
//! primitive in [`deferred`], and the owning async task in [`driver`].

pub mod deferred;
pub mod driver;
pub mod machine;
pub mod sasl_driver;

pub use self::deferred::{AsyncSequenceOfMatches, CompletesWithFirstMatchingCommand, DeferredCommand, ReplyPredicate};
pub use self::driver::{ChallengeResponder, SessionDriver, SessionHandle};
pub use self::machine::{
    network_info_from_isupport, Action, RegistrationInfo, SaslCredential, SessionMachine, SessionState,
};
pub use self::sasl_driver::{chunk_authenticate_payload, SaslRun, SaslStep};
