//! Converging the destination to the target state

use super::SourceState;
use crate::entry::ActualStateEntry;
use crate::entry_state::{EntryState, EntryStateType};
use crate::entry_types::EntryTypeFilter;
use crate::error::{Error, Result};
use crate::persistent::{ENTRY_STATE_BUCKET, PersistentState, get_json, set_json};
use crate::system::System;
use hearth_core::Umask;
use hearth_core::path::RelPath;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use tracing::{debug, warn};

/// What to do when applying one entry fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Stop at the first failure
    #[default]
    Abort,
    /// Record the failure and continue with the next entry
    KeepGoing,
}

/// Answer of the pre-apply hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreApplyDecision {
    /// Apply the entry
    Proceed,
    /// Leave the entry alone
    Skip,
    /// Stop the whole apply
    Abort,
}

/// Hook called before an entry is changed
///
/// Receives the target path, the target state, the last state written by a
/// previous apply if any, and the actual state.
pub type PreApplyFn<'a> =
    dyn FnMut(&RelPath, &EntryState, Option<&EntryState>, &EntryState) -> Result<PreApplyDecision> + 'a;

/// Options for [`SourceState::apply`]
pub struct ApplyOptions<'a> {
    /// Which entry types to touch
    pub filter: EntryTypeFilter,
    /// Mask for created permissions
    pub umask: Umask,
    /// Failure handling in [`SourceState::apply_all`]
    pub policy: ErrorPolicy,
    /// Hook consulted before each entry
    pub pre_apply: Option<Box<PreApplyFn<'a>>>,
}

impl ApplyOptions<'_> {
    /// Options applying everything with `umask`
    pub fn new(umask: Umask) -> Self {
        ApplyOptions {
            filter: EntryTypeFilter::default(),
            umask,
            policy: ErrorPolicy::default(),
            pre_apply: None,
        }
    }
}

impl std::fmt::Debug for ApplyOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyOptions")
            .field("filter", &self.filter)
            .field("umask", &self.umask)
            .field("policy", &self.policy)
            .field("pre_apply", &self.pre_apply.is_some())
            .finish()
    }
}

/// Result of applying one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The destination was changed
    Changed,
    /// The destination already matched
    Unchanged,
    /// Filtered out, already run, or skipped by the hook
    Skipped,
}

/// Summary of [`SourceState::apply_all`]
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Targets that were changed
    pub applied: Vec<RelPath>,
    /// Targets that were skipped
    pub skipped: Vec<RelPath>,
    /// Targets that failed under [`ErrorPolicy::KeepGoing`]
    pub errors: Vec<(RelPath, Error)>,
}

impl ApplyReport {
    /// Whether every entry succeeded
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl SourceState {
    /// Apply a single target
    ///
    /// The pre-apply hook sees the entry before anything changes. A hook
    /// abort returns [`Error::Aborted`].
    pub fn apply(
        &self,
        system: &dyn System,
        persistent: &dyn PersistentState,
        target_rel: &RelPath,
        options: &mut ApplyOptions<'_>,
    ) -> Result<EntryOutcome> {
        let Some(source_entry) = self.entries.get(target_rel) else {
            return Err(Error::NotManaged {
                target: target_rel.clone(),
            });
        };
        if !options.filter.include_source(source_entry) {
            return Ok(EntryOutcome::Skipped);
        }

        let target_abs = self.dest_dir.join(target_rel);
        // modify_ reads the destination as it is, whatever sink receives the result
        let target =
            source_entry.target_state_entry(&*self.dest_system, &self.source_dir, target_rel, &target_abs)?;
        if !options.filter.include_target(&target) {
            return Ok(EntryOutcome::Skipped);
        }

        let umask = options.umask;
        let target_state = target.entry_state(umask)?;
        if target.skip_apply(persistent, &target_abs)? {
            debug!(target = %target_rel, "script already ran");
            return Ok(EntryOutcome::Skipped);
        }

        let actual = ActualStateEntry::read(system, &target_abs)?;
        let key = target_abs.to_slash();

        if let Some(hook) = options.pre_apply.as_mut() {
            let actual_state = actual.entry_state()?;
            let mut last_written: Option<EntryState> = get_json(persistent, ENTRY_STATE_BUCKET, key.as_bytes())?;

            // Identical edits to source and destination: record them as
            // written rather than reporting a difference from the old state
            if EntryState::equivalent(Some(&target_state), Some(&actual_state), umask)
                && !EntryState::equivalent(last_written.as_ref(), Some(&actual_state), umask)
            {
                set_json(persistent, ENTRY_STATE_BUCKET, key.as_bytes(), &target_state)?;
                last_written = Some(target_state.clone());
            }

            match hook(target_rel, &target_state, last_written.as_ref(), &actual_state)? {
                PreApplyDecision::Proceed => {}
                PreApplyDecision::Skip => {
                    debug!(target = %target_rel, "skipped by pre-apply hook");
                    return Ok(EntryOutcome::Skipped);
                }
                PreApplyDecision::Abort => return Err(Error::Aborted),
            }
        }

        if !target.apply(system, persistent, &actual, &target_abs, umask)? {
            return Ok(EntryOutcome::Unchanged);
        }
        set_json(persistent, ENTRY_STATE_BUCKET, key.as_bytes(), &target_state)?;
        Ok(EntryOutcome::Changed)
    }

    /// Apply `target_rels` in order, then run [`post_apply`](Self::post_apply)
    ///
    /// Failures follow `options.policy`. A hook abort always stops the run.
    pub fn apply_all(
        &self,
        system: &dyn System,
        persistent: &dyn PersistentState,
        target_rels: &[RelPath],
        options: &mut ApplyOptions<'_>,
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();
        for target_rel in target_rels {
            match self.apply(system, persistent, target_rel, options) {
                Ok(EntryOutcome::Changed) => report.applied.push(target_rel.clone()),
                Ok(EntryOutcome::Unchanged) => {}
                Ok(EntryOutcome::Skipped) => report.skipped.push(target_rel.clone()),
                Err(Error::Aborted) => return Err(Error::Aborted),
                Err(e) => match options.policy {
                    ErrorPolicy::Abort => return Err(e.context(target_rel.to_string())),
                    ErrorPolicy::KeepGoing => {
                        warn!(target = %target_rel, error = %e, "failed to apply");
                        report.errors.push((target_rel.clone(), e));
                    }
                },
            }
        }
        self.post_apply(system, persistent, target_rels)?;
        Ok(report)
    }

    /// Remove `remove_` directories among `target_rels` that are now empty
    ///
    /// Directories are visited deepest first. Missing and non-empty
    /// directories are left alone.
    pub fn post_apply(
        &self,
        system: &dyn System,
        persistent: &dyn PersistentState,
        target_rels: &[RelPath],
    ) -> Result<()> {
        let selected: BTreeSet<&RelPath> = target_rels.iter().collect();
        for target_rel in self.remove_dirs.iter().rev() {
            if !selected.contains(target_rel) {
                continue;
            }
            let target_abs = self.dest_dir.join(target_rel);
            match system.stat(&target_abs) {
                Ok(info) if info.is_dir() => {}
                Ok(_) => return Err(Error::NotDir { path: target_abs }),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
            match system.remove(&target_abs) {
                Ok(()) => {}
                Err(e)
                    if e.is_not_found()
                        || matches!(
                            e.io_kind(),
                            Some(ErrorKind::DirectoryNotEmpty | ErrorKind::AlreadyExists)
                        ) =>
                {
                    debug!(target = %target_rel, error = %e, "keeping remove_ directory");
                    continue;
                }
                Err(e) => return Err(e),
            }
            let state = EntryState::new(EntryStateType::Absent, 0);
            set_json(persistent, ENTRY_STATE_BUCKET, target_abs.to_slash().as_bytes(), &state)?;
        }
        Ok(())
    }
}
