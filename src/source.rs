//! Chunk sources: where chunk text comes from.
//!
//! A source yields documents in a stable order, each with its chunks in
//! ordinal order. Chunking itself happens upstream; the directory source
//! only reads one chunk per non-blank line.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::types::{InvalidSourceFileId, SourceFileId};

/// File extension read by [`DirectoryChunkSource`].
pub const CHUNK_FILE_EXTENSION: &str = "txt";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Chunks directory not found: '{path}'\nSuggestion: Set paths.chunks_dir in settings or pass --chunks")]
    MissingDirectory { path: PathBuf },

    #[error("Failed to list '{path}': {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("Failed to read '{path}': {source}\nSuggestion: Chunk files must be UTF-8 text")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    InvalidId(#[from] InvalidSourceFileId),
}

/// All chunks of one source file, in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub source_file_id: SourceFileId,
    pub chunks: Vec<String>,
}

impl SourceDocument {
    pub fn new(source_file_id: SourceFileId, chunks: Vec<String>) -> Self {
        Self {
            source_file_id,
            chunks,
        }
    }

    /// Splits `text` into one chunk per non-blank line, trimmed.
    pub fn from_lines(source_file_id: SourceFileId, text: &str) -> Self {
        let chunks = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(source_file_id, chunks)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// A file the source could not turn into a document.
#[derive(Debug)]
pub struct SourceFailure {
    pub path: PathBuf,
    pub error: SourceError,
}

/// Documents read by one scan, plus the files that were skipped.
#[derive(Debug, Default)]
pub struct SourceScan {
    pub documents: Vec<SourceDocument>,
    pub failures: Vec<SourceFailure>,
}

impl SourceScan {
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.documents.iter().map(|d| d.chunks.len()).sum()
    }
}

/// Producer of `(source_file_id, chunk_text)` sequences grouped by document.
pub trait ChunkSource {
    /// Reads every document. Per-file problems go into [`SourceScan::failures`];
    /// `Err` means the source as a whole is unusable.
    fn scan(&self) -> Result<SourceScan, SourceError>;
}

/// Reads `*.txt` chunk files from one directory, sorted by file name.
///
/// The source file id is the file name. Subdirectories are not descended.
#[derive(Debug, Clone)]
pub struct DirectoryChunkSource {
    root: PathBuf,
}

impl DirectoryChunkSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_document(path: &Path, file_name: &str) -> Result<SourceDocument, SourceError> {
        let source_file_id = SourceFileId::new(file_name)?;
        let text = std::fs::read_to_string(path).map_err(|source| SourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(SourceDocument::from_lines(source_file_id, &text))
    }
}

impl ChunkSource for DirectoryChunkSource {
    fn scan(&self) -> Result<SourceScan, SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::MissingDirectory {
                path: self.root.clone(),
            });
        }

        let mut scan = SourceScan::default();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|source| SourceError::Walk {
                path: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CHUNK_FILE_EXTENSION) {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!(path = %path.display(), "Skipping chunk file with non UTF-8 name");
                continue;
            };

            match Self::read_document(path, file_name) {
                Ok(document) => scan.documents.push(document),
                Err(error) => {
                    tracing::warn!(path = %path.display(), error = %error, "Skipping chunk file");
                    scan.failures.push(SourceFailure {
                        path: path.to_path_buf(),
                        error,
                    });
                }
            }
        }

        tracing::debug!(
            documents = scan.documents.len(),
            chunks = scan.chunk_count(),
            failures = scan.failures.len(),
            root = %self.root.display(),
            "Scanned chunk directory"
        );
        Ok(scan)
    }
}

/// Documents already in memory.
impl ChunkSource for Vec<SourceDocument> {
    fn scan(&self) -> Result<SourceScan, SourceError> {
        Ok(SourceScan {
            documents: self.clone(),
            failures: Vec::new(),
        })
    }
}
