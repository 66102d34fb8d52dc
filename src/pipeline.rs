//! End-to-end operations: chunks to bundles, bundles to index, text to hits.
//!
//! Per-file problems are logged and recorded in the reports; only failures
//! that make the whole operation meaningless are returned as errors.

use std::collections::BTreeSet;
use std::path::Path;

use thiserror::Error;

use crate::error::{PipelineError, PipelineResult};
use crate::index::{IndexBuilder, IndexMetadata, IndexReader, SearchHit};
use crate::source::{ChunkSource, SourceDocument, SourceFailure};
use crate::store::{BundleFailure, BundleStore, EmbeddingBundle, StoreError};
use crate::types::SourceFileId;
use crate::vector::{EncodeError, VectorEncoder};

/// Why one source file produced no bundle.
#[derive(Error, Debug)]
pub enum FileError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to one source file during [`embed_documents`].
#[derive(Debug)]
pub enum EmbedStatus {
    /// Bundle written with this many vectors
    Embedded { vectors: usize },
    /// No chunks; nothing written
    SkippedEmpty,
    /// Partial vectors discarded; any previous bundle left in place
    Failed(FileError),
}

#[derive(Debug)]
pub struct FileOutcome {
    pub source_file_id: SourceFileId,
    pub status: EmbedStatus,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmbedOptions {
    /// Delete bundles of source files that no longer exist
    pub prune: bool,
}

/// Result of one [`embed_documents`] run.
#[derive(Debug, Default)]
pub struct EmbedReport {
    pub files: Vec<FileOutcome>,
    /// Files the source could not read
    pub unreadable: Vec<SourceFailure>,
    pub pruned: Vec<SourceFileId>,
}

impl EmbedReport {
    #[must_use]
    pub fn embedded_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, EmbedStatus::Embedded { .. }))
            .count()
    }

    #[must_use]
    pub fn vector_count(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f.status {
                EmbedStatus::Embedded { vectors } => vectors,
                _ => 0,
            })
            .sum()
    }

    #[must_use]
    pub fn failed_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, EmbedStatus::Failed(_)))
            .count()
            + self.unreadable.len()
    }
}

/// Encodes every document of `source` and stores one bundle per file.
///
/// A failure in one file never stops the others. Files without chunks are
/// skipped and produce no bundle.
pub fn embed_documents(
    source: &dyn ChunkSource,
    encoder: &VectorEncoder,
    store: &dyn BundleStore,
    options: EmbedOptions,
) -> PipelineResult<EmbedReport> {
    let scan = source.scan()?;
    let mut report = EmbedReport::default();

    tracing::info!(
        documents = scan.documents.len(),
        chunks = scan.chunk_count(),
        model = %encoder.model_name(),
        "Embedding documents"
    );

    for document in &scan.documents {
        let status = embed_document(document, encoder, store);
        match &status {
            EmbedStatus::Embedded { vectors } => {
                tracing::info!(source_file_id = %document.source_file_id, vectors, "Saved embeddings");
            }
            EmbedStatus::SkippedEmpty => {
                tracing::warn!(source_file_id = %document.source_file_id, "File has no chunks, skipping");
            }
            EmbedStatus::Failed(error) => {
                tracing::warn!(source_file_id = %document.source_file_id, error = %error, "Failed to embed file");
            }
        }
        report.files.push(FileOutcome {
            source_file_id: document.source_file_id.clone(),
            status,
        });
    }

    if options.prune {
        let live = live_ids(&scan.documents, &scan.failures);
        report.pruned = store.prune(&live)?;
    }
    report.unreadable = scan.failures;

    Ok(report)
}

fn embed_document(
    document: &SourceDocument,
    encoder: &VectorEncoder,
    store: &dyn BundleStore,
) -> EmbedStatus {
    if document.is_empty() {
        return EmbedStatus::SkippedEmpty;
    }

    let result = encoder
        .encode(&document.chunks)
        .map_err(FileError::from)
        .and_then(|vectors| EmbeddingBundle::new(vectors).map_err(FileError::from))
        .and_then(|bundle| {
            store.put(&document.source_file_id, &bundle)?;
            Ok(bundle.len())
        });

    match result {
        Ok(vectors) => EmbedStatus::Embedded { vectors },
        Err(error) => EmbedStatus::Failed(error),
    }
}

/// Ids whose bundles must survive a prune: every file that still has chunks,
/// plus files that exist but could not be read this time.
fn live_ids(documents: &[SourceDocument], unreadable: &[SourceFailure]) -> BTreeSet<SourceFileId> {
    let present = documents
        .iter()
        .filter(|d| !d.is_empty())
        .map(|d| d.source_file_id.clone());
    let unreadable = unreadable.iter().filter_map(|f| {
        f.path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| SourceFileId::new(n).ok())
    });
    present.chain(unreadable).collect()
}

/// Result of one [`build_index`] run.
#[derive(Debug)]
pub struct BuildReport {
    pub metadata: IndexMetadata,
    /// Bundles that could not be read and were left out of the index
    pub skipped: Vec<BundleFailure>,
}

/// Builds the index pair in `index_dir` from every readable bundle in `store`.
///
/// Nothing is written when the store yields no vectors or the bundles
/// disagree on dimension.
pub fn build_index(
    store: &dyn BundleStore,
    index_dir: &Path,
    model_name: &str,
) -> PipelineResult<BuildReport> {
    let loaded = store.load_all()?;
    let built = IndexBuilder::from_bundles(loaded.bundles)?;
    let metadata = built.write_to(index_dir, model_name)?;

    Ok(BuildReport {
        metadata,
        skipped: loaded.failures,
    })
}

/// Encodes `text` with `encoder` and queries `reader`.
pub fn query_text(
    reader: &IndexReader,
    encoder: &VectorEncoder,
    text: &str,
    k: usize,
) -> PipelineResult<Vec<SearchHit>> {
    if text.trim().is_empty() {
        return Err(PipelineError::InvalidInput {
            reason: "query text is empty".to_string(),
        });
    }
    let mut vectors = encoder.encode(&[text])?;
    let vector = vectors.pop().ok_or_else(|| PipelineError::InvalidInput {
        reason: "encoder returned no vector for the query".to_string(),
    })?;
    Ok(reader.query(&vector, k)?)
}

/// Parses a comma separated vector such as `1,0,0.5`.
pub fn parse_query_vector(input: &str) -> PipelineResult<Vec<f32>> {
    input
        .split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| PipelineError::InvalidInput {
                    reason: format!("'{part}' is not a finite number"),
                })
        })
        .collect()
}
