mod batch;
mod cap;
mod chathistory;

pub use batch::BatchSubCommand;
pub use cap::CapSubCommand;
pub use chathistory::{ChatHistorySubCommand, MessageReference};
