//! Persisted snapshots of applied entries
//!
//! After an entry is applied its [`EntryState`] is recorded. The next apply
//! compares the recorded state with what is on disk to detect changes made
//! behind hearth's back.

use crate::hash::Sha256Hash;
use hearth_core::Umask;
use hearth_core::mode::PERM_MASK;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Kind of a recorded entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStateType {
    /// The entry must not exist
    #[serde(alias = "remove")]
    Absent,
    /// A file that only has to exist
    Present,
    /// A directory
    Dir,
    /// A regular file
    File,
    /// A symbolic link
    Symlink,
    /// A script that was run
    Script,
}

/// Snapshot of an entry as last written
///
/// Serialized as `{"type": ..., "mode": ..., "contentsSHA256": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryState {
    #[serde(rename = "type")]
    pub kind: EntryStateType,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub mode: u32,
    #[serde(
        rename = "contentsSHA256",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_hex",
        deserialize_with = "deserialize_hex"
    )]
    pub contents_sha256: Option<Sha256Hash>,
    /// Contents, kept in memory for diffs only
    #[serde(skip)]
    pub contents: Option<Vec<u8>>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(mode: &u32) -> bool {
    *mode == 0
}

#[allow(clippy::ref_option)]
fn serialize_hex<S: Serializer>(hash: &Option<Sha256Hash>, s: S) -> Result<S::Ok, S::Error> {
    match hash {
        Some(hash) => s.serialize_str(&hex::encode(hash)),
        None => s.serialize_none(),
    }
}

fn deserialize_hex<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Sha256Hash>, D::Error> {
    let Some(s) = Option::<String>::deserialize(d)? else {
        return Ok(None);
    };
    let mut hash = [0u8; 32];
    hex::decode_to_slice(&s, &mut hash).map_err(serde::de::Error::custom)?;
    Ok(Some(hash))
}

impl EntryState {
    /// An entry state with no contents
    pub fn new(kind: EntryStateType, mode: u32) -> Self {
        EntryState {
            kind,
            mode,
            contents_sha256: None,
            contents: None,
        }
    }

    /// The state of an absent entry
    pub fn absent() -> Self {
        Self::new(EntryStateType::Absent, 0)
    }

    /// Attach a contents hash
    #[must_use]
    pub fn with_sha256(mut self, hash: Sha256Hash) -> Self {
        self.contents_sha256 = Some(hash);
        self
    }

    /// Attach in-memory contents
    #[must_use]
    pub fn with_contents(mut self, contents: Vec<u8>) -> Self {
        self.contents = Some(contents);
        self
    }

    /// Exact equality of kind, permission bits, and contents hash
    pub fn equal(&self, other: &EntryState) -> bool {
        self.kind == other.kind
            && self.mode & PERM_MASK == other.mode & PERM_MASK
            && self.contents_sha256 == other.contents_sha256
    }

    /// Whether two possibly missing states describe the same outcome
    ///
    /// - a missing state is equivalent to `Absent`
    /// - a `Script` state is equivalent to anything, since scripts are
    ///   judged by their run history
    /// - `File` and `Present` are interchangeable
    /// - permission bits are compared after masking with `umask`
    pub fn equivalent(this: Option<&EntryState>, other: Option<&EntryState>, umask: Umask) -> bool {
        let is_script = |s: Option<&EntryState>| s.is_some_and(|s| s.kind == EntryStateType::Script);
        if is_script(this) || is_script(other) {
            return true;
        }
        match (this, other) {
            (None, None) => true,
            (None, Some(s)) | (Some(s), None) => s.kind == EntryStateType::Absent,
            (Some(a), Some(b)) => {
                let kinds_match = a.kind == b.kind
                    || matches!(
                        (a.kind, b.kind),
                        (EntryStateType::File, EntryStateType::Present)
                            | (EntryStateType::Present, EntryStateType::File)
                    );
                kinds_match
                    && umask.apply(a.mode) == umask.apply(b.mode)
                    && a.contents_sha256 == b.contents_sha256
            }
        }
    }
}

impl PartialEq for EntryState {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other)
    }
}

impl Eq for EntryState {}
