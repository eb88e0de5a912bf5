//! Deferred, memoized, error-caching values
//!
//! File contents and symlink targets are expensive to compute (reads,
//! decryption, template rendering) and many are never needed. A [`Lazy`]
//! cell runs its evaluator at most once and remembers either the value or
//! the error.
//!
//! The engine is single-threaded, so cells use `RefCell` and `Rc` rather
//! than locks.

use crate::error::{Error, Result};
use crate::hash::{Sha256Hash, hash_content};
use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

type Evaluator<T> = Box<dyn FnOnce() -> Result<T>>;

/// State of a lazy cell
enum LazyState<T> {
    Unevaluated(Evaluator<T>),
    Evaluating,
    Evaluated(T),
    Failed(Arc<Error>),
}

/// A value computed on first use
pub struct Lazy<T> {
    state: RefCell<LazyState<T>>,
}

impl<T: Clone> Lazy<T> {
    /// A cell that runs `f` on first access
    pub fn new(f: impl FnOnce() -> Result<T> + 'static) -> Self {
        Lazy {
            state: RefCell::new(LazyState::Unevaluated(Box::new(f))),
        }
    }

    /// An already-evaluated cell
    pub fn evaluated(value: T) -> Self {
        Lazy {
            state: RefCell::new(LazyState::Evaluated(value)),
        }
    }

    /// A cell that has already failed
    pub fn failed(err: Error) -> Self {
        Lazy {
            state: RefCell::new(LazyState::Failed(Arc::new(err))),
        }
    }

    /// Get the value, evaluating it if needed
    ///
    /// A failed evaluation is cached; later calls return the same error
    /// wrapped in [`Error::Deferred`].
    pub fn get(&self) -> Result<T> {
        let pending = {
            let mut state = self.state.borrow_mut();
            match std::mem::replace(&mut *state, LazyState::Evaluating) {
                LazyState::Unevaluated(f) => f,
                LazyState::Evaluated(value) => {
                    let out = value.clone();
                    *state = LazyState::Evaluated(value);
                    return Ok(out);
                }
                LazyState::Failed(err) => {
                    *state = LazyState::Failed(Arc::clone(&err));
                    return Err(Error::Deferred(err));
                }
                LazyState::Evaluating => {
                    return Err(Error::State("lazy value evaluated recursively".to_string()));
                }
            }
        };

        let result = pending();
        let mut state = self.state.borrow_mut();
        match result {
            Ok(value) => {
                *state = LazyState::Evaluated(value.clone());
                Ok(value)
            }
            Err(err) => {
                let err = Arc::new(err);
                *state = LazyState::Failed(Arc::clone(&err));
                Err(Error::Deferred(err))
            }
        }
    }

    /// Whether the evaluator has already run
    pub fn is_evaluated(&self) -> bool {
        matches!(
            &*self.state.borrow(),
            LazyState::Evaluated(_) | LazyState::Failed(_)
        )
    }
}

impl<T> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.borrow() {
            LazyState::Unevaluated(_) => "unevaluated",
            LazyState::Evaluating => "evaluating",
            LazyState::Evaluated(_) => "evaluated",
            LazyState::Failed(_) => "failed",
        };
        f.debug_struct("Lazy").field("state", &state).finish()
    }
}

struct ContentsCell {
    contents: Lazy<Rc<[u8]>>,
    sha256: OnceCell<Sha256Hash>,
}

/// Lazily computed file contents with a cached SHA-256
///
/// Cloning shares the cell. The default value is empty contents, which is
/// never an error.
///
/// # Examples
///
/// ```
/// use hearth_engine::lazy::LazyContents;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let contents = LazyContents::new(|| Ok(b"hello".to_vec()));
/// assert_eq!(&*contents.contents()?, b"hello");
/// assert_eq!(contents.contents_sha256()?, hearth_engine::hash::hash_content(b"hello"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LazyContents(Rc<ContentsCell>);

impl LazyContents {
    /// Contents produced by `f` on first access
    pub fn new(f: impl FnOnce() -> Result<Vec<u8>> + 'static) -> Self {
        Self::from_lazy(Lazy::new(move || f().map(Rc::from)))
    }

    /// Contents known up front
    pub fn from_bytes(contents: impl Into<Rc<[u8]>>) -> Self {
        Self::from_lazy(Lazy::evaluated(contents.into()))
    }

    /// Contents whose evaluation has already failed
    pub fn failed(err: Error) -> Self {
        Self::from_lazy(Lazy::failed(err))
    }

    fn from_lazy(contents: Lazy<Rc<[u8]>>) -> Self {
        LazyContents(Rc::new(ContentsCell {
            contents,
            sha256: OnceCell::new(),
        }))
    }

    /// Contents derived from these contents by `f`
    pub fn map(&self, f: impl FnOnce(Rc<[u8]>) -> Result<Vec<u8>> + 'static) -> Self {
        let source = self.clone();
        Self::new(move || f(source.contents()?))
    }

    /// The contents
    pub fn contents(&self) -> Result<Rc<[u8]>> {
        self.0.contents.get()
    }

    /// SHA-256 of the contents
    pub fn contents_sha256(&self) -> Result<Sha256Hash> {
        if let Some(hash) = self.0.sha256.get() {
            return Ok(*hash);
        }
        let hash = hash_content(&self.contents()?);
        Ok(*self.0.sha256.get_or_init(|| hash))
    }

    /// Force evaluation, surfacing any error
    pub fn evaluate(&self) -> Result<()> {
        self.contents_sha256().map(|_| ())
    }
}

impl Default for LazyContents {
    fn default() -> Self {
        Self::from_bytes(Vec::new())
    }
}

impl fmt::Debug for LazyContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LazyContents").field(&self.0.contents).finish()
    }
}

/// A lazily computed symlink target
///
/// The default value is an empty link name, which means "no link".
#[derive(Clone)]
pub struct LazyLinkname(Rc<Lazy<String>>);

impl LazyLinkname {
    /// Link name produced by `f` on first access
    pub fn new(f: impl FnOnce() -> Result<String> + 'static) -> Self {
        LazyLinkname(Rc::new(Lazy::new(f)))
    }

    /// Link name known up front
    pub fn from_string(linkname: impl Into<String>) -> Self {
        LazyLinkname(Rc::new(Lazy::evaluated(linkname.into())))
    }

    /// Link name derived from file contents, with surrounding whitespace trimmed
    pub fn from_contents(contents: &LazyContents) -> Self {
        let contents = contents.clone();
        Self::new(move || {
            let bytes = contents.contents()?;
            Ok(String::from_utf8_lossy(&bytes).trim().to_string())
        })
    }

    /// The link name
    pub fn linkname(&self) -> Result<String> {
        self.0.get()
    }

    /// Force evaluation, surfacing any error
    pub fn evaluate(&self) -> Result<()> {
        self.linkname().map(|_| ())
    }
}

impl Default for LazyLinkname {
    fn default() -> Self {
        Self::from_string(String::new())
    }
}

impl fmt::Debug for LazyLinkname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LazyLinkname").field(&self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_evaluates_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let lazy = Lazy::new(move || {
            counter.set(counter.get() + 1);
            Ok(42)
        });
        assert!(!lazy.is_evaluated());
        assert_eq!(lazy.get().unwrap(), 42);
        assert_eq!(lazy.get().unwrap(), 42);
        assert_eq!(calls.get(), 1);
        assert!(lazy.is_evaluated());
    }

    #[test]
    fn test_caches_errors() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let lazy: Lazy<i32> = Lazy::new(move || {
            counter.set(counter.get() + 1);
            Err(Error::State("boom".to_string()))
        });
        let first = lazy.get().unwrap_err();
        let second = lazy.get().unwrap_err();
        assert_eq!(first.to_string(), "State persistence error: boom");
        assert_eq!(second.to_string(), first.to_string());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_default_contents_are_empty() {
        let contents = LazyContents::default();
        assert!(contents.contents().unwrap().is_empty());
        assert_eq!(contents.contents_sha256().unwrap(), hash_content(b""));
        assert_eq!(LazyLinkname::default().linkname().unwrap(), "");
    }

    #[test]
    fn test_clones_share_evaluation() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let contents = LazyContents::new(move || {
            counter.set(counter.get() + 1);
            Ok(b"x".to_vec())
        });
        let other = contents.clone();
        contents.evaluate().unwrap();
        other.evaluate().unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_map_propagates_errors() {
        let failed = LazyContents::failed(Error::State("no".to_string()));
        let mapped = failed.map(|c| Ok(c.to_vec()));
        assert!(mapped.contents().is_err());

        let upper = LazyContents::from_bytes(b"abc".to_vec())
            .map(|c| Ok(c.to_ascii_uppercase()));
        assert_eq!(&*upper.contents().unwrap(), b"ABC");
    }

    #[test]
    fn test_linkname_from_contents_trims() {
        let contents = LazyContents::from_bytes(b"  /target\n".to_vec());
        let link = LazyLinkname::from_contents(&contents);
        assert_eq!(link.linkname().unwrap(), "/target");
    }
}
