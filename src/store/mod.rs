//! Embedding store: per-source-file vector bundles behind a key-value API.
//!
//! `put` overwrites the bundle for a key atomically; `get_all` returns every
//! bundle together with the keys that could not be read. A broken bundle never
//! hides the others, so one corrupt file cannot block a whole corpus from
//! being indexed.
//!
//! Two backends are provided: [`FileBundleStore`] keeps one binary file per
//! source file (`<source_file_id>_embeddings.vec`), and [`MemoryBundleStore`]
//! keeps everything in a map.

mod bundle;
mod file;
mod memory;

pub use bundle::EmbeddingBundle;
pub use file::{BUNDLE_FILE_SUFFIX, FileBundleStore};
pub use memory::MemoryBundleStore;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{InvalidSourceFileId, SourceFileId};

/// Errors raised by bundle stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}\nSuggestion: Check disk space and file permissions")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(
        "Corrupt bundle '{path}': {reason}\nSuggestion: Re-run embedding for this source file to regenerate it"
    )]
    Corrupt { path: PathBuf, reason: String },

    #[error(
        "Refusing to store an empty bundle\nSuggestion: Source files without chunks should not produce a bundle"
    )]
    EmptyBundle,

    #[error(
        "Bundle vectors disagree on dimension: vector {position} has {actual} components, expected {expected}"
    )]
    RaggedBundle {
        position: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Bundle vectors have zero components\nSuggestion: The embedding model must produce non-empty vectors")]
    ZeroDimension,

    #[error(
        "Bundle vector {position} has a NaN or infinite value at component {component}\nSuggestion: Re-run embedding for this source file"
    )]
    NonFiniteValue { position: usize, component: usize },

    #[error("Bundle of {vectors} vectors with {dimension} components exceeds the file format limits")]
    TooLarge { vectors: usize, dimension: usize },

    #[error(transparent)]
    InvalidKey(#[from] InvalidSourceFileId),
}

/// One key whose bundle could not be loaded.
#[derive(Debug)]
pub struct BundleFailure {
    /// Key as found in the store; may not be a valid [`SourceFileId`].
    pub key: String,
    pub error: StoreError,
}

/// Result of scanning a store.
#[derive(Debug, Default)]
pub struct LoadedBundles {
    pub bundles: BTreeMap<SourceFileId, EmbeddingBundle>,
    pub failures: Vec<BundleFailure>,
}

impl LoadedBundles {
    /// Total number of vectors across all loaded bundles.
    #[must_use]
    pub fn vector_count(&self) -> usize {
        self.bundles.values().map(EmbeddingBundle::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

/// Key-value persistence for embedding bundles.
///
/// Implementations must make `put` atomic per key: a reader sees either the
/// previous bundle or the new one, never a mix or a truncated write.
pub trait BundleStore: Send + Sync {
    /// Stores `bundle` under `key`, replacing any previous bundle.
    fn put(&self, key: &SourceFileId, bundle: &EmbeddingBundle) -> Result<(), StoreError>;

    /// Loads the bundle for one key, `None` if absent.
    fn get(&self, key: &SourceFileId) -> Result<Option<EmbeddingBundle>, StoreError>;

    /// Loads every bundle. Per-key failures are collected, not returned as `Err`;
    /// `Err` means the store itself could not be listed.
    fn get_all(&self) -> Result<LoadedBundles, StoreError>;

    /// Deletes the bundle for `key`. Returns whether one existed.
    fn remove(&self, key: &SourceFileId) -> Result<bool, StoreError>;

    /// Keys currently present, in sorted order.
    fn keys(&self) -> Result<Vec<SourceFileId>, StoreError>;

    /// Persists the vectors of one source file.
    ///
    /// Validates the key and the vectors before touching the store, so an
    /// invalid call leaves any previous bundle in place.
    fn save(&self, source_file_id: &str, vectors: Vec<Vec<f32>>) -> Result<(), StoreError> {
        let key = SourceFileId::new(source_file_id)?;
        let bundle = EmbeddingBundle::new(vectors)?;
        self.put(&key, &bundle)
    }

    /// Loads every bundle and logs the ones that were skipped.
    fn load_all(&self) -> Result<LoadedBundles, StoreError> {
        let loaded = self.get_all()?;
        for failure in &loaded.failures {
            tracing::warn!(key = %failure.key, error = %failure.error, "Skipping unreadable bundle");
        }
        tracing::debug!(
            bundles = loaded.bundles.len(),
            vectors = loaded.vector_count(),
            failures = loaded.failures.len(),
            "Loaded embedding bundles"
        );
        Ok(loaded)
    }

    /// Removes every bundle whose key is not in `live`.
    ///
    /// Stale bundles are never purged implicitly; this is the explicit
    /// opt-in for callers that know the full set of current source files.
    fn prune(&self, live: &BTreeSet<SourceFileId>) -> Result<Vec<SourceFileId>, StoreError> {
        let mut removed = Vec::new();
        for key in self.keys()? {
            if !live.contains(&key) && self.remove(&key)? {
                tracing::info!(key = %key, "Pruned stale bundle");
                removed.push(key);
            }
        }
        Ok(removed)
    }
}
