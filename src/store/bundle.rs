//! The per-file unit of persistence: every vector of one source file.

use crate::store::StoreError;
use crate::vector::{VectorDimension, non_finite_component};

/// Ordered vectors for the chunks of one source file.
///
/// A bundle is never empty, all of its vectors share one non-zero dimension
/// and every component is finite. The store and the index builder rely on
/// these checks made at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingBundle {
    dimension: VectorDimension,
    vectors: Vec<Vec<f32>>,
}

impl EmbeddingBundle {
    /// Wraps the vectors of one source file, in chunk order.
    ///
    /// # Errors
    /// [`StoreError::EmptyBundle`] for zero vectors, [`StoreError::ZeroDimension`]
    /// for empty vectors, [`StoreError::RaggedBundle`] when the vectors disagree
    /// on their length and [`StoreError::NonFiniteValue`] for NaN or infinity.
    pub fn new(vectors: Vec<Vec<f32>>) -> Result<Self, StoreError> {
        let first = vectors.first().ok_or(StoreError::EmptyBundle)?;
        let dimension =
            VectorDimension::new(first.len()).map_err(|_| StoreError::ZeroDimension)?;

        if let Some((position, vector)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != dimension.get())
        {
            return Err(StoreError::RaggedBundle {
                position,
                expected: dimension.get(),
                actual: vector.len(),
            });
        }

        for (position, vector) in vectors.iter().enumerate() {
            if let Some(component) = non_finite_component(vector) {
                return Err(StoreError::NonFiniteValue {
                    position,
                    component,
                });
            }
        }

        Ok(Self { dimension, vectors })
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Number of vectors, equal to the number of chunks of the source file.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Always false; kept for API symmetry with collections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[must_use]
    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }
}
