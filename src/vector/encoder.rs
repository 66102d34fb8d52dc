//! Batched vector encoding over an [`EmbeddingGenerator`].
//!
//! Input chunks are split into contiguous slices of `batch_size` (the last one
//! may be shorter), each slice is embedded independently, and the results are
//! concatenated in input order. With parallel batches enabled the slices run on
//! a rayon pool, but reassembly still follows batch order, so the output is
//! index-for-index identical to a sequential run.

use std::ops::Range;
use std::sync::Arc;

use indicatif::ProgressBar;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use thiserror::Error;

use crate::display::progress::create_progress_bar;
use crate::vector::{EmbeddingGenerator, VectorDimension, VectorError};

/// Default number of chunks per embedding call.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// A batch failed to encode.
///
/// `completed` holds the vectors of every batch before the failing one, in
/// order, so callers can keep or discard them as they see fit.
#[derive(Error, Debug)]
#[error("Failed to encode chunks {batch_start}..{batch_end}: {source}")]
pub struct EncodeError {
    pub batch_start: usize,
    pub batch_end: usize,
    pub completed: Vec<Vec<f32>>,
    #[source]
    pub source: VectorError,
}

impl EncodeError {
    /// Boundaries of the failing batch as a half-open range of chunk positions.
    #[must_use]
    pub fn batch(&self) -> Range<usize> {
        self.batch_start..self.batch_end
    }
}

/// Turns ordered chunk texts into ordered vectors.
pub struct VectorEncoder {
    generator: Arc<dyn EmbeddingGenerator>,
    batch_size: usize,
    pool: Option<ThreadPool>,
    show_progress: bool,
}

impl std::fmt::Debug for VectorEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorEncoder")
            .field("model", &self.generator.model_name())
            .field("batch_size", &self.batch_size)
            .field("parallel", &self.pool.is_some())
            .finish()
    }
}

impl VectorEncoder {
    /// Creates a sequential encoder.
    ///
    /// # Errors
    /// Returns [`VectorError::InvalidBatchSize`] when `batch_size` is zero.
    pub fn new(
        generator: Arc<dyn EmbeddingGenerator>,
        batch_size: usize,
    ) -> Result<Self, VectorError> {
        if batch_size == 0 {
            return Err(VectorError::InvalidBatchSize(batch_size));
        }
        Ok(Self {
            generator,
            batch_size,
            pool: None,
            show_progress: false,
        })
    }

    /// Runs batches on a dedicated pool of `threads` workers.
    ///
    /// One thread (or zero) keeps the encoder sequential.
    pub fn with_parallelism(mut self, threads: usize) -> Result<Self, VectorError> {
        self.pool = if threads > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("ragdex-encode-{i}"))
                .build()
                .map_err(|e| {
                    VectorError::EmbeddingFailed(format!("Failed to start encoder pool: {e}"))
                })?;
            Some(pool)
        } else {
            None
        };
        Ok(self)
    }

    /// Shows a progress bar per encode call.
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.generator.dimension()
    }

    #[must_use]
    pub fn model_name(&self) -> String {
        self.generator.model_name()
    }

    /// Encodes `chunks` into one vector per chunk, in input order.
    ///
    /// Blank chunks are rejected before any batch is sent to the model.
    pub fn encode<S: AsRef<str> + Sync>(&self, chunks: &[S]) -> Result<Vec<Vec<f32>>, EncodeError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(position) = chunks.iter().position(|c| c.as_ref().trim().is_empty()) {
            let batch_start = position - position % self.batch_size;
            return Err(EncodeError {
                batch_start,
                batch_end: (batch_start + self.batch_size).min(chunks.len()),
                completed: Vec::new(),
                source: VectorError::EmptyText { position },
            });
        }

        let batch_count = chunks.len().div_ceil(self.batch_size);
        let progress = if self.show_progress {
            create_progress_bar(batch_count as u64, "Generating embeddings")
        } else {
            ProgressBar::hidden()
        };

        tracing::debug!(
            chunks = chunks.len(),
            batches = batch_count,
            batch_size = self.batch_size,
            parallel = self.pool.is_some(),
            "Encoding chunks"
        );

        let result = match &self.pool {
            Some(pool) => self.encode_parallel(pool, chunks, &progress),
            None => self.encode_sequential(chunks, &progress),
        };

        progress.finish_and_clear();
        result
    }

    fn encode_sequential<S: AsRef<str>>(
        &self,
        chunks: &[S],
        progress: &ProgressBar,
    ) -> Result<Vec<Vec<f32>>, EncodeError> {
        let mut vectors = Vec::with_capacity(chunks.len());

        for (batch_index, batch) in chunks.chunks(self.batch_size).enumerate() {
            let batch_start = batch_index * self.batch_size;
            match self.encode_batch(batch) {
                Ok(batch_vectors) => vectors.extend(batch_vectors),
                Err(source) => {
                    return Err(EncodeError {
                        batch_start,
                        batch_end: batch_start + batch.len(),
                        completed: vectors,
                        source,
                    });
                }
            }
            progress.inc(1);
        }

        Ok(vectors)
    }

    fn encode_parallel<S: AsRef<str> + Sync>(
        &self,
        pool: &ThreadPool,
        chunks: &[S],
        progress: &ProgressBar,
    ) -> Result<Vec<Vec<f32>>, EncodeError> {
        // Indexed collect keeps batch order regardless of completion order.
        let results: Vec<Result<Vec<Vec<f32>>, VectorError>> = pool.install(|| {
            chunks
                .par_chunks(self.batch_size)
                .map(|batch| {
                    let result = self.encode_batch(batch);
                    progress.inc(1);
                    result
                })
                .collect()
        });

        let mut vectors = Vec::with_capacity(chunks.len());
        for (batch_index, result) in results.into_iter().enumerate() {
            let batch_start = batch_index * self.batch_size;
            match result {
                Ok(batch_vectors) => vectors.extend(batch_vectors),
                Err(source) => {
                    return Err(EncodeError {
                        batch_start,
                        batch_end: (batch_start + self.batch_size).min(chunks.len()),
                        completed: vectors,
                        source,
                    });
                }
            }
        }

        Ok(vectors)
    }

    /// Embeds one batch and checks the backend kept its contract.
    fn encode_batch<S: AsRef<str>>(&self, batch: &[S]) -> Result<Vec<Vec<f32>>, VectorError> {
        let texts: Vec<&str> = batch.iter().map(AsRef::as_ref).collect();
        let vectors = self.generator.generate_embeddings(&texts)?;

        if vectors.len() != texts.len() {
            return Err(VectorError::CountMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }

        let dimension = self.generator.dimension();
        for vector in &vectors {
            dimension.validate_vector(vector)?;
        }

        Ok(vectors)
    }
}
