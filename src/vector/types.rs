//! Type-safe wrappers and core error type for vector operations.

use thiserror::Error;

use crate::vector::non_finite_component;

/// Type-safe wrapper for vector dimensions.
///
/// Every vector produced by one model configuration has the same dimension;
/// this type is the single place that check lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension and only finite
    /// components.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        if let Some(component) = non_finite_component(vector) {
            return Err(VectorError::NonFinite { component });
        }
        Ok(())
    }
}

impl std::fmt::Display for VectorDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur during vector operations.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error(
        "Embedding generation failed: {0}\nSuggestion: Verify the embedding model is properly initialized"
    )]
    EmbeddingFailed(String),

    #[error(
        "Embedding count mismatch: sent {expected} texts, received {actual} vectors\nSuggestion: The embedding backend must return one vector per input text"
    )]
    CountMismatch { expected: usize, actual: usize },

    #[error(
        "Embedding has a NaN or infinite value at component {component}\nSuggestion: Check the embedding model output; such vectors cannot be ranked by distance"
    )]
    NonFinite { component: usize },

    #[error("Empty chunk text at position {position}\nSuggestion: Drop blank chunks before encoding")]
    EmptyText { position: usize },

    #[error("Unknown embedding model '{name}'\nSuggestion: Use one of: {supported}")]
    UnknownModel { name: String, supported: String },

    #[error("Invalid batch size: {0}\nSuggestion: Batch size must be at least 1")]
    InvalidBatchSize(usize),
}
