//! Vector generation for chunk text.
//!
//! The embedding model sits behind [`EmbeddingGenerator`]; [`VectorEncoder`]
//! adds the batching policy on top of it. Every vector produced by one model
//! configuration has the same [`VectorDimension`].

mod distance;
mod embedding;
mod encoder;
mod types;

#[cfg(test)]
pub use embedding::MockEmbeddingGenerator;
pub use distance::{non_finite_component, squared_euclidean};
pub use embedding::{
    EmbeddingGenerator, FastEmbedGenerator, SUPPORTED_MODELS, model_to_string,
    parse_embedding_model,
};
pub use encoder::{DEFAULT_BATCH_SIZE, EncodeError, VectorEncoder};
pub use types::{VectorDimension, VectorError};
