//! Apply command implementation
//!
//! Converge the destination directory to the target state.

use clap::Args;
use hearth_core::Umask;
use hearth_core::path::RelPath;
use hearth_engine::hash::{hash_content, to_hex};
use hearth_engine::persistent::{CONFIG_STATE_BUCKET, PersistentState, set_json};
use hearth_engine::system::DryRunSystem;
use hearth_engine::{ApplyOptions, ApplyReport, EntryState, ErrorPolicy, PreApplyDecision};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::command::Command;
use crate::common::{FilterArgs, RuntimeContext};
use crate::error::{CommandError, Result};
use crate::stats;

/// Key under which the config file hash is recorded
const CONFIG_STATE_KEY: &[u8] = b"configState";

/// Apply the source state to the destination
#[derive(Debug, Clone, Args)]
pub struct ApplyCommand {
    /// Targets to apply (all if not specified)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Show what would change without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Overwrite targets that changed since hearth last wrote them
    #[arg(short, long)]
    pub force: bool,

    /// Keep applying after an entry fails
    #[arg(short, long)]
    pub keep_going: bool,

    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Whether to overwrite a target, given what hearth last wrote there
///
/// A target is left alone when its actual state differs both from the last
/// written state and from the target state: someone else edited it.
pub fn overwrite_decision(
    target_rel: &RelPath,
    target: &EntryState,
    last_written: Option<&EntryState>,
    actual: &EntryState,
    umask: Umask,
) -> PreApplyDecision {
    let Some(last_written) = last_written else {
        return PreApplyDecision::Proceed;
    };
    if EntryState::equivalent(Some(last_written), Some(actual), umask)
        || EntryState::equivalent(Some(target), Some(actual), umask)
    {
        return PreApplyDecision::Proceed;
    }
    warn!(target = %target_rel, "changed since it was last written, skipping (use --force to overwrite)");
    PreApplyDecision::Skip
}

fn record_config(context: &RuntimeContext, persistent: &dyn PersistentState) -> Result<()> {
    let Some(path) = &context.config_file else {
        return Ok(());
    };
    let contents = fs::read(path)?;
    let value = json!({ "configFileContentsSHA256": to_hex(&hash_content(&contents)) });
    set_json(persistent, CONFIG_STATE_BUCKET, CONFIG_STATE_KEY, &value)?;
    Ok(())
}

impl Command for ApplyCommand {
    type Output = ApplyReport;

    fn execute(&self, context: &RuntimeContext) -> Result<ApplyReport> {
        let system = context.system();
        let state = context.read_source_state(&system)?;
        let targets = context.selected_targets(&state, &self.files)?;

        let persistent = if self.dry_run {
            context.snapshot_state()?
        } else {
            context.open_state()?
        };

        let umask = context.umask;
        let mut options = ApplyOptions::new(umask);
        options.filter = self.filter.filter()?;
        if self.keep_going || context.config.keep_going {
            options.policy = ErrorPolicy::KeepGoing;
        }
        if !self.force {
            options.pre_apply = Some(Box::new(
                move |target_rel: &RelPath,
                      target: &EntryState,
                      last_written: Option<&EntryState>,
                      actual: &EntryState|
                      -> hearth_engine::Result<PreApplyDecision> {
                    Ok(overwrite_decision(target_rel, target, last_written, actual, umask))
                },
            ));
        }

        info!(targets = targets.len(), dry_run = self.dry_run, "applying");
        let report = if self.dry_run {
            let dry_run = DryRunSystem::new(&*system);
            state.apply_all(&dry_run, &*persistent, &targets, &mut options)?
        } else {
            let report = state.apply_all(&*system, &*persistent, &targets, &mut options)?;
            record_config(context, &*persistent)?;
            report
        };

        if targets.len() > 1 {
            stats::print_summary(&report, self.dry_run);
        }
        if !report.is_ok() {
            return Err(CommandError::ApplyFailed {
                failed: report.errors.len(),
                total: targets.len(),
            });
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use hearth_engine::EntryStateType;

    fn file(mode: u32, contents: &[u8]) -> EntryState {
        EntryState::new(EntryStateType::File, mode).with_sha256(hash_content(contents))
    }

    fn decide(target: &EntryState, last: Option<&EntryState>, actual: &EntryState) -> PreApplyDecision {
        let rel = RelPath::new(".bashrc").unwrap();
        overwrite_decision(&rel, target, last, actual, Umask::new(0o022))
    }

    #[test]
    fn test_first_apply_proceeds() {
        assert_eq!(
            decide(&file(0o644, b"new"), None, &file(0o644, b"local")),
            PreApplyDecision::Proceed
        );
    }

    #[test]
    fn test_untouched_target_proceeds() {
        let last = file(0o644, b"old");
        assert_eq!(
            decide(&file(0o644, b"new"), Some(&last), &file(0o644, b"old")),
            PreApplyDecision::Proceed
        );
    }

    #[test]
    fn test_local_edit_is_skipped() {
        let last = file(0o644, b"old");
        assert_eq!(
            decide(&file(0o644, b"new"), Some(&last), &file(0o644, b"local")),
            PreApplyDecision::Skip
        );
    }

    #[test]
    fn test_local_edit_matching_target_proceeds() {
        let last = file(0o644, b"old");
        assert_eq!(
            decide(&file(0o644, b"new"), Some(&last), &file(0o644, b"new")),
            PreApplyDecision::Proceed
        );
    }
}
