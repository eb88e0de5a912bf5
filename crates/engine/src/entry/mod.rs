//! The entry model
//!
//! - [`SourceStateEntry`]: what the source tree says about a target path
//! - [`TargetStateEntry`]: the resolved desired state of that path
//! - [`ActualStateEntry`]: what currently exists there
//!
//! Applying an entry turns the actual state into the target state through
//! a [`System`](crate::system::System).

mod actual;
mod source;
mod target;

pub use actual::ActualStateEntry;
pub use source::SourceStateEntry;
pub use target::TargetStateEntry;

pub(crate) use target::is_empty;
