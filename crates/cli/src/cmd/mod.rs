//! CLI command implementations

pub mod add;
pub mod apply;
pub mod archive;
pub mod diff;
pub mod dump;
pub mod import;
pub mod state;
pub mod status;
