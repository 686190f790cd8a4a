
mod parse;
pub mod record;
pub mod ref_enum;
mod serialize;
pub mod subcommands;
mod types;

pub use record::{CommandFactory, CommandRecord, Direction, FactoryOptions, MessageKind};
pub use ref_enum::CommandRefEnum;
pub use subcommands::{BatchSubCommand, CapSubCommand};
pub use types::{Command, CommandRef};

