//! # Hearth Engine
//!
//! The state machinery of the hearth dotfile manager.
//!
//! - **Attributes**: decoding and encoding source file names
//! - **Source state**: reading the source tree into managed entries
//! - **Entries**: source, target and actual states of one path
//! - **Apply**: converging the destination through a [`System`](system::System)
//! - **Persistent state**: what was last written and which scripts ran
//! - **Systems**: real, dry-run, read-only, diff, dump and archive backends

pub mod attr;
pub mod autotemplate;
pub mod entry;
pub mod entry_state;
pub mod entry_types;
pub mod error;
pub mod format;
pub mod hash;
pub mod lazy;
pub mod patterns;
pub mod persistent;
pub mod processor;
pub mod source_state;
pub mod system;
pub mod version;

pub use hearth_core::path::{AbsPath, RelPath, SourceRelPath};

pub use attr::{DirAttr, FileAttr, ScriptCondition, SourceFileType};
pub use entry::{ActualStateEntry, SourceStateEntry, TargetStateEntry};
pub use entry_state::{EntryState, EntryStateType};
pub use entry_types::{EntryTypeFilter, EntryTypeSet};
pub use error::{Error, Result};
pub use processor::ContentProcessor;
pub use source_state::{
    AddOptions, ApplyOptions, ApplyReport, EntryOutcome, ErrorPolicy, PreApplyDecision, ReadOptions, SourceState,
};
pub use version::Version;
