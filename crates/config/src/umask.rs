//! Capturing the process umask
//!
//! The umask can only be read by setting it, so [`current`] sets it to zero
//! and immediately restores the old value. Call it once at startup, before
//! anything else creates files.

use hearth_core::Umask;
use rustix::fs::Mode;

/// The umask of the running process
pub fn current() -> Umask {
    let old = rustix::process::umask(Mode::empty());
    rustix::process::umask(old);
    Umask::new(u32::from(old.bits()))
}
