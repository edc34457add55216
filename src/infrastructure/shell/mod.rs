pub mod command_executor;

pub use command_executor::{CommandExecutor, CommandResult, CommandSpec, ShellCommandExecutor};
