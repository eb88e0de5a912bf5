//! Status command implementation
//!
//! Each line has two status columns and a target path. The first column
//! compares what hearth last wrote with what is there now; the second
//! compares what is there now with the target state.
//!
//! - ` ` no change
//! - `A` added
//! - `D` deleted
//! - `M` modified
//! - `R` script will run

use clap::Args;
use hearth_core::Umask;
use hearth_core::path::RelPath;
use hearth_engine::system::DryRunSystem;
use hearth_engine::{ApplyOptions, EntryState, EntryStateType, PreApplyDecision};
use owo_colors::OwoColorize;
use std::cell::RefCell;
use std::path::PathBuf;

use crate::command::Command;
use crate::common::{FilterArgs, RuntimeContext};
use crate::error::Result;

/// Show which targets an apply would change
#[derive(Debug, Clone, Args)]
pub struct StatusCommand {
    /// Targets to check (all if not specified)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Status of one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// Last written versus actual
    pub last: char,
    /// Actual versus target
    pub next: char,
    /// The target
    pub target: RelPath,
}

fn status_char(from: Option<&EntryState>, to: &EntryState) -> char {
    let from_absent = from.is_none_or(|s| s.kind == EntryStateType::Absent);
    match to.kind {
        EntryStateType::Absent => 'D',
        EntryStateType::Script => 'R',
        _ if from_absent => 'A',
        _ => 'M',
    }
}

/// The status columns for one target, or `None` when nothing differs
pub fn status_of(
    target: &EntryState,
    last_written: Option<&EntryState>,
    actual: &EntryState,
    umask: Umask,
) -> Option<(char, char)> {
    let last = match last_written {
        Some(last) if !EntryState::equivalent(Some(last), Some(actual), umask) => status_char(Some(last), actual),
        _ => ' ',
    };
    let next = if target.kind == EntryStateType::Script {
        'R'
    } else if EntryState::equivalent(Some(actual), Some(target), umask) {
        ' '
    } else {
        status_char(Some(actual), target)
    };
    (last != ' ' || next != ' ').then_some((last, next))
}

impl StatusCommand {
    /// Compute the status of every selected target
    pub fn lines(&self, context: &RuntimeContext) -> Result<Vec<StatusLine>> {
        let system = context.read_only_system();
        let state = context.read_source_state(&system)?;
        let targets = context.selected_targets(&state, &self.files)?;
        let persistent = context.snapshot_state()?;

        let umask = context.umask;
        let lines = RefCell::new(Vec::new());
        let mut options = ApplyOptions::new(umask);
        options.filter = self.filter.filter()?;
        options.pre_apply = Some(Box::new(
            |target_rel: &RelPath,
             target: &EntryState,
             last_written: Option<&EntryState>,
             actual: &EntryState|
             -> hearth_engine::Result<PreApplyDecision> {
                if let Some((last, next)) = status_of(target, last_written, actual, umask) {
                    lines.borrow_mut().push(StatusLine {
                        last,
                        next,
                        target: target_rel.clone(),
                    });
                }
                Ok(PreApplyDecision::Skip)
            },
        ));

        let dry_run = DryRunSystem::new(&*system);
        state.apply_all(&dry_run, &*persistent, &targets, &mut options)?;
        drop(options);
        Ok(lines.into_inner())
    }
}

impl Command for StatusCommand {
    type Output = Vec<StatusLine>;

    fn execute(&self, context: &RuntimeContext) -> Result<Vec<StatusLine>> {
        let lines = self.lines(context)?;
        for line in &lines {
            println!(
                "{}{} {}",
                line.last.bright_yellow(),
                line.next.bright_green(),
                line.target
            );
        }
        Ok(lines)
    }
}
