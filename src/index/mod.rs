//! Exact nearest-neighbor index and the identity table built alongside it.
//!
//! A build produces three files in the index directory:
//! - `index.flat`: the vectors, in insertion order
//! - `identities.bin`: source file id and ordinal for every position
//! - `metadata.json`: informational summary of the build
//!
//! The first two form one unit. Both carry the same build id and the reader
//! refuses a pair whose counts or build ids disagree.

mod builder;
mod flat;
mod identity;
mod metadata;
mod reader;

pub use builder::{BuiltIndex, IndexBuilder};
pub use flat::{FlatIndex, METRIC_SQUARED_L2};
pub use identity::{ChunkIdentity, IdentityTable};
pub use metadata::IndexMetadata;
pub use reader::{IndexReader, SearchHit};

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::types::SourceFileId;

/// File name of the vector artifact.
pub const INDEX_FILE: &str = "index.flat";
/// File name of the identity table artifact.
pub const IDENTITY_FILE: &str = "identities.bin";
/// File name of the build summary.
pub const METADATA_FILE: &str = "metadata.json";

/// Errors raised while building, persisting, loading or querying an index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("No embeddings to index\nSuggestion: Run 'ragdex embed' first so the store has at least one bundle")]
    EmptyCorpus,

    #[error(
        "Dimension mismatch: '{established_by}' has {expected}-dimensional vectors but '{conflicting}' has {actual}\nSuggestion: Re-embed all source files with the same model"
    )]
    DimensionMismatch {
        established_by: SourceFileId,
        expected: usize,
        conflicting: SourceFileId,
        actual: usize,
    },

    #[error("Vector has {actual} dimensions, index expects {expected}")]
    WrongDimension { expected: usize, actual: usize },

    #[error(
        "Vector has a NaN or infinite value at component {component}\nSuggestion: Only finite vectors can be ranked by distance"
    )]
    NonFiniteVector { component: usize },

    #[error("Index artifact not found: '{path}'\nSuggestion: Run 'ragdex build' to create the index")]
    MissingArtifact { path: PathBuf },

    #[error(
        "Index holds {index_count} vectors but identity table holds {identity_count} entries\nSuggestion: The artifacts come from different builds; run 'ragdex build' again"
    )]
    CountMismatch {
        index_count: usize,
        identity_count: usize,
    },

    #[error(
        "Index build {index_build:016x} does not match identity table build {identity_build:016x}\nSuggestion: The artifacts come from different builds; run 'ragdex build' again"
    )]
    BuildMismatch { index_build: u64, identity_build: u64 },

    #[error("Invalid index artifact '{path}': {reason}\nSuggestion: Run 'ragdex build' to regenerate it")]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("Corpus exceeds the supported number of chunks per source file: '{source_file_id}'")]
    OrdinalOverflow { source_file_id: SourceFileId },

    #[error("I/O error on '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl IndexError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn invalid(path: &Path, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Writes `path` through a temporary file in the same directory and renames it
/// into place once `write` has finished and the data is synced.
pub(crate) fn persist_atomically(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<&File>) -> io::Result<()>,
) -> Result<(), IndexError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(IndexError::io(dir))?;

    let temp = NamedTempFile::new_in(dir).map_err(IndexError::io(path))?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        write(&mut writer).map_err(IndexError::io(path))?;
        writer.flush().map_err(IndexError::io(path))?;
    }
    temp.as_file().sync_all().map_err(IndexError::io(path))?;
    temp.persist(path).map_err(|e| IndexError::io(path)(e.error))?;
    Ok(())
}

/// Fails with [`IndexError::MissingArtifact`] when `path` does not exist.
pub(crate) fn require_artifact(path: &Path) -> Result<(), IndexError> {
    if path.exists() {
        Ok(())
    } else {
        Err(IndexError::MissingArtifact {
            path: path.to_path_buf(),
        })
    }
}
