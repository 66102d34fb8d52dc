//! Batched document embedding and exact nearest-neighbor indexing.
//!
//! Chunk text flows through four stages:
//! [`source`] yields chunks per document, [`vector`] turns them into vectors
//! in batches, [`store`] keeps one bundle per source file, and [`index`]
//! builds a searchable index whose every position maps back to the chunk it
//! came from.

pub mod config;
pub mod display;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod types;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use error::{PipelineError, PipelineResult};
pub use index::{IndexBuilder, IndexError, IndexReader, SearchHit};
pub use pipeline::{EmbedOptions, build_index, embed_documents};
pub use source::{ChunkSource, DirectoryChunkSource, SourceDocument};
pub use store::{BundleStore, EmbeddingBundle, FileBundleStore, MemoryBundleStore, StoreError};
pub use types::{ChunkOrdinal, SourceFileId};
pub use vector::{EmbeddingGenerator, EncodeError, VectorEncoder, VectorError};
