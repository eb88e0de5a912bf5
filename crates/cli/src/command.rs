//! Command trait for the hearth CLI

use crate::common::RuntimeContext;
use crate::error::Result;

/// A subcommand that runs against a [`RuntimeContext`]
///
/// # Example
///
/// ```rust,ignore
/// use crate::command::Command;
/// use crate::common::RuntimeContext;
/// use crate::error::Result;
/// use clap::Args;
///
/// #[derive(Debug, Args)]
/// pub struct MyCommand {
///     #[arg(short, long)]
///     pub some_flag: bool,
/// }
///
/// impl Command for MyCommand {
///     type Output = ();
///
///     fn execute(&self, context: &RuntimeContext) -> Result<()> {
///         let state = context.read_source_state(&context.system())?;
///         Ok(())
///     }
/// }
/// ```
pub trait Command {
    /// The type returned by this command
    type Output;

    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns a `CommandError` describing what went wrong
    fn execute(&self, context: &RuntimeContext) -> Result<Self::Output>;
}
