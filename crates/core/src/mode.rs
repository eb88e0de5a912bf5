//! File permission helpers
//!
//! The process umask is captured once at startup and passed around as a
//! [`Umask`] value. Nothing in hearth reads it from a global.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Permission bits that matter when comparing modes.
pub const PERM_MASK: u32 = 0o777;

/// A umask value
///
/// # Examples
///
/// ```
/// use hearth_core::Umask;
///
/// let umask = Umask::new(0o022);
/// assert_eq!(umask.apply(0o666), 0o644);
/// assert_eq!(umask.apply(0o777), 0o755);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Umask(u32);

impl Umask {
    /// The conventional umask of most systems.
    pub const DEFAULT: Umask = Umask(0o022);

    /// A umask that masks nothing.
    pub const NONE: Umask = Umask(0);

    /// Create a umask, keeping only permission bits
    pub const fn new(bits: u32) -> Self {
        Umask(bits & PERM_MASK)
    }

    /// Raw umask bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Mask `perm` with this umask
    pub const fn apply(self, perm: u32) -> u32 {
        perm & PERM_MASK & !self.0
    }

    /// Parse an octal string such as `"022"` or `"0o077"`
    pub fn parse(s: &str) -> crate::Result<Self> {
        let digits = s.trim().trim_start_matches("0o");
        u32::from_str_radix(digits, 8)
            .map(Self::new)
            .map_err(|e| crate::Error::Message(format!("invalid umask {s:?}: {e}")))
    }
}

impl Default for Umask {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Umask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03o}", self.0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_apply_masks_bits() {
        assert_eq!(Umask::new(0o077).apply(0o666), 0o600);
        assert_eq!(Umask::NONE.apply(0o755), 0o755);
        assert_eq!(Umask::new(0o022).apply(0o100_644), 0o644);
    }

    #[test]
    fn test_parse() {
        assert_eq!(Umask::parse("022").unwrap(), Umask::new(0o022));
        assert_eq!(Umask::parse("0o077").unwrap(), Umask::new(0o077));
        assert!(Umask::parse("9").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Umask::new(0o22).to_string(), "022");
    }
}
