//! IRC mode parsing and types.

mod parse;
mod types;

pub use self::types::{ChannelMode, Mode, ModeType, UserMode};
