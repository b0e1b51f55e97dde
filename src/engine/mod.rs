pub mod commands;
pub mod poller;

pub use commands::{Command, CommandChannel, CommandListener};
pub use poller::{PollState, Poller, ScanReport};
