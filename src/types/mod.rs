//! Identity types shared by the store, the index and the query surface.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use thiserror::Error;

/// Rejected source file identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid source file id '{id}': {reason}\nSuggestion: Use a plain file name without path separators")]
pub struct InvalidSourceFileId {
    pub id: String,
    pub reason: &'static str,
}

/// Identifier of the document a chunk came from.
///
/// The id doubles as a store key, so it must map to exactly one file name:
/// no path separators, no NUL bytes, and not `.` or `..`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceFileId(String);

impl SourceFileId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidSourceFileId> {
        let id = id.into();
        let reason = if id.is_empty() {
            Some("id is empty")
        } else if id == "." || id == ".." {
            Some("id is a relative directory reference")
        } else if id.contains(['/', '\\']) {
            Some("id contains a path separator")
        } else if id.contains('\0') {
            Some("id contains a NUL byte")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(InvalidSourceFileId { id, reason }),
            None => Ok(Self(id)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SourceFileId {
    type Error = InvalidSourceFileId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SourceFileId> for String {
    fn from(id: SourceFileId) -> Self {
        id.0
    }
}

impl fmt::Display for SourceFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SourceFileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 1-based position of a chunk within its source file.
///
/// Uses `NonZeroU32` so an uninitialized (zero) ordinal cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkOrdinal(NonZeroU32);

impl ChunkOrdinal {
    /// Creates an ordinal from a 1-based value. Returns `None` for zero.
    #[must_use]
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    /// Ordinal for the chunk at the given 0-based offset within its file.
    ///
    /// Returns `None` if the offset does not fit in a `u32` ordinal.
    #[must_use]
    pub fn from_offset(offset: usize) -> Option<Self> {
        u32::try_from(offset)
            .ok()
            .and_then(|o| o.checked_add(1))
            .and_then(Self::new)
    }

    /// The first chunk of a file.
    #[must_use]
    pub const fn first() -> Self {
        Self(NonZeroU32::MIN)
    }

    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ChunkOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_file_id_accepts_plain_names() {
        let id = SourceFileId::new("report.pdf.txt").unwrap();
        assert_eq!(id.as_str(), "report.pdf.txt");
        assert_eq!(id.to_string(), "report.pdf.txt");
    }

    #[test]
    fn test_source_file_id_rejects_unmappable_names() {
        for bad in ["", ".", "..", "a/b", "a\\b", "nul\0byte"] {
            assert!(SourceFileId::new(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_source_file_id_serde_validates() {
        let ok: SourceFileId = serde_json::from_str("\"a.txt\"").unwrap();
        assert_eq!(ok.as_str(), "a.txt");
        assert!(serde_json::from_str::<SourceFileId>("\"../etc\"").is_err());
    }

    #[test]
    fn test_chunk_ordinal_is_one_based() {
        assert!(ChunkOrdinal::new(0).is_none());
        assert_eq!(ChunkOrdinal::first().get(), 1);
        assert_eq!(ChunkOrdinal::from_offset(0).unwrap().get(), 1);
        assert_eq!(ChunkOrdinal::from_offset(41).unwrap().get(), 42);
        assert!(ChunkOrdinal::from_offset(u32::MAX as usize).is_none());
    }
}
