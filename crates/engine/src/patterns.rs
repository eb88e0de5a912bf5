//! Include/exclude glob pattern sets
//!
//! `.chezmoiignore` and `.chezmoiremove` compile into a [`PatternSet`].
//! Lines are include patterns; lines starting with `!` are exclude patterns.
//! Exclusion always wins over inclusion.
//!
//! Patterns use `/` separators. `*` does not cross a separator; `**` matches
//! any number of path components.
//!
//! # Examples
//!
//! ```
//! use hearth_engine::patterns::{PatternMatch, PatternSet};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut set = PatternSet::new();
//! set.add(".config/**", true)?;
//! set.add(".config/keep", false)?;
//! assert_eq!(set.matches(".config/a/b"), PatternMatch::Include);
//! assert_eq!(set.matches(".config/keep"), PatternMatch::Exclude);
//! assert_eq!(set.matches(".bashrc"), PatternMatch::Exclude);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use crate::system::System;
use glob::{MatchOptions, Pattern};
use hearth_core::path::{AbsPath, RelPath};
use std::collections::BTreeSet;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Outcome of matching a path against a [`PatternSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternMatch {
    /// Matched an include pattern, or only exclude patterns exist
    Include,
    /// Matched nothing and both kinds of pattern exist, or none do
    Unknown,
    /// Matched an exclude pattern, or only include patterns exist
    Exclude,
}

/// A set of include and exclude glob patterns
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl PatternSet {
    /// An empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pattern
    pub fn add(&mut self, pattern: &str, include: bool) -> Result<()> {
        let compiled = Pattern::new(pattern).map_err(|e| Error::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.msg.to_string(),
        })?;
        let patterns = if include {
            &mut self.includes
        } else {
            &mut self.excludes
        };
        if !patterns.iter().any(|p| p.as_str() == pattern) {
            patterns.push(compiled);
        }
        Ok(())
    }

    /// Whether no patterns have been added
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    /// Match a slash-separated relative path
    pub fn matches(&self, name: &str) -> PatternMatch {
        if self.excludes.iter().any(|p| p.matches_with(name, MATCH_OPTIONS)) {
            return PatternMatch::Exclude;
        }
        if self.includes.iter().any(|p| p.matches_with(name, MATCH_OPTIONS)) {
            return PatternMatch::Include;
        }
        match (self.includes.is_empty(), self.excludes.is_empty()) {
            (false, true) => PatternMatch::Exclude,
            (true, false) => PatternMatch::Include,
            _ => PatternMatch::Unknown,
        }
    }

    /// Whether `name` matches an include pattern and no exclude pattern
    ///
    /// Unlike [`matches`](Self::matches), a set holding only exclude
    /// patterns includes nothing.
    pub fn includes(&self, name: &str) -> bool {
        !self.excludes.iter().any(|p| p.matches_with(name, MATCH_OPTIONS))
            && self.includes.iter().any(|p| p.matches_with(name, MATCH_OPTIONS))
    }

    /// Expand the include patterns under `base` through `system`
    ///
    /// Matches of any exclude pattern are dropped. Results are relative to
    /// `base` and sorted.
    pub fn glob(&self, system: &dyn System, base: &AbsPath) -> Result<Vec<RelPath>> {
        let mut matches = BTreeSet::new();
        for include in &self.includes {
            for found in system.glob(base, include.as_str())? {
                let rel = found.strip_prefix(base)?;
                if !self
                    .excludes
                    .iter()
                    .any(|p| p.matches_with(rel.as_str(), MATCH_OPTIONS))
                {
                    matches.insert(rel);
                }
            }
        }
        Ok(matches.into_iter().collect())
    }
}

/// Match a single pattern against a slash-separated path
pub(crate) fn glob_match(pattern: &Pattern, name: &str) -> bool {
    pattern.matches_with(name, MATCH_OPTIONS)
}
