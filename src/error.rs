//! Error types for the embedding and indexing pipeline
//!
//! Each module owns its error enum; [`PipelineError`] wraps them for the
//! operations that span modules and adds status codes and recovery hints for
//! the command line.

use thiserror::Error;

use crate::index::IndexError;
use crate::source::SourceError;
use crate::store::StoreError;
use crate::vector::{EncodeError, VectorError};

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },
}

impl PipelineError {
    /// Wraps a settings failure.
    pub fn config(reason: impl std::fmt::Display) -> Self {
        Self::Config {
            reason: reason.to_string(),
        }
    }

    /// Get a status code for this error
    pub fn status_code(&self) -> String {
        match self {
            Self::Source(SourceError::MissingDirectory { .. }) => "CHUNKS_NOT_FOUND",
            Self::Source(_) => "SOURCE_ERROR",
            Self::Encode(_) => "ENCODING_FAILED",
            Self::Vector(VectorError::UnknownModel { .. }) => "UNKNOWN_MODEL",
            Self::Vector(_) => "EMBEDDING_ERROR",
            Self::Store(StoreError::Corrupt { .. }) => "BUNDLE_CORRUPTED",
            Self::Store(_) => "STORE_ERROR",
            Self::Index(IndexError::EmptyCorpus) => "EMPTY_CORPUS",
            Self::Index(IndexError::DimensionMismatch { .. }) => "DIMENSION_MISMATCH",
            Self::Index(IndexError::WrongDimension { .. }) => "QUERY_DIMENSION_MISMATCH",
            Self::Index(IndexError::NonFiniteVector { .. }) => "INVALID_VECTOR",
            Self::Index(IndexError::MissingArtifact { .. }) => "INDEX_NOT_FOUND",
            Self::Index(IndexError::CountMismatch { .. } | IndexError::BuildMismatch { .. }) => {
                "INDEX_PAIR_MISMATCH"
            }
            Self::Index(IndexError::InvalidFormat { .. }) => "INDEX_CORRUPTED",
            Self::Index(_) => "INDEX_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::InvalidInput { .. } => "INVALID_INPUT",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Source(SourceError::MissingDirectory { .. }) => vec![
                "Check paths.chunks_dir in .ragdex/settings.toml",
                "Pass the directory explicitly with 'ragdex embed --chunks <DIR>'",
            ],
            Self::Encode(_) | Self::Vector(VectorError::EmbeddingFailed(_)) => vec![
                "Check that the embedding model downloaded completely",
                "Try a smaller --batch-size if the model runs out of memory",
            ],
            Self::Vector(VectorError::UnknownModel { .. }) => vec![
                "Set embedding.model to one of the supported model names",
            ],
            Self::Index(IndexError::EmptyCorpus) => vec![
                "Run 'ragdex embed' to populate the embeddings directory",
                "Check paths.embeddings_dir points at the directory embed wrote to",
            ],
            Self::Index(IndexError::DimensionMismatch { .. }) => vec![
                "Re-run 'ragdex embed' so every bundle uses the same model",
                "Remove bundles produced by a different model from the embeddings directory",
            ],
            Self::Index(IndexError::MissingArtifact { .. }) => {
                vec!["Run 'ragdex build' to create the index"]
            }
            Self::Index(
                IndexError::CountMismatch { .. }
                | IndexError::BuildMismatch { .. }
                | IndexError::InvalidFormat { .. },
            ) => vec![
                "Run 'ragdex build' to rewrite both index artifacts together",
                "Do not copy index.flat or identities.bin between index directories",
            ],
            Self::Index(IndexError::WrongDimension { .. }) => vec![
                "Query vectors must have the same dimension as the indexed embeddings",
                "Use 'ragdex info' to see the index dimension",
            ],
            Self::Store(_) => vec![
                "Check disk space and permissions in the embeddings directory",
                "Re-run 'ragdex embed' to regenerate unreadable bundles",
            ],
            Self::Index(IndexError::NonFiniteVector { .. }) => vec![
                "Query vectors must contain only finite numbers",
            ],
            Self::Config { .. } => vec![
                "Check .ragdex/settings.toml and RAGDEX_* environment variables",
                "Run 'ragdex init --force' to write a fresh settings file",
            ],
            _ => vec![],
        }
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
