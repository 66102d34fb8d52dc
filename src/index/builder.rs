//! Single-pass construction of the index and its identity table.

use std::path::Path;

use crate::index::{
    ChunkIdentity, FlatIndex, IDENTITY_FILE, INDEX_FILE, IdentityTable, IndexError, IndexMetadata,
    IndexReader,
};
use crate::store::EmbeddingBundle;
use crate::types::{ChunkOrdinal, SourceFileId};

/// Accumulates bundles into an index and identity table in lock-step.
///
/// Each vector is appended to the index in the same step that appends its
/// identity, so `identities[i]` always describes `index[i]`.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    index: Option<FlatIndex>,
    identities: IdentityTable,
    established_by: Option<SourceFileId>,
    bundle_count: usize,
}

/// An index and identity table that have been built but not yet persisted.
#[derive(Debug)]
pub struct BuiltIndex {
    pub index: FlatIndex,
    pub identities: IdentityTable,
    pub bundle_count: usize,
}

impl IndexBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds from every bundle of a store scan, in the given iteration order.
    pub fn from_bundles<I>(bundles: I) -> Result<BuiltIndex, IndexError>
    where
        I: IntoIterator<Item = (SourceFileId, EmbeddingBundle)>,
    {
        let mut builder = Self::new();
        for (source_file_id, bundle) in bundles {
            builder.add_bundle(&source_file_id, &bundle)?;
        }
        builder.finish()
    }

    /// Appends every vector of one source file, with ordinals 1..=len.
    ///
    /// The dimension is checked for the whole bundle before anything is
    /// appended, so a rejected bundle leaves the builder unchanged.
    pub fn add_bundle(
        &mut self,
        source_file_id: &SourceFileId,
        bundle: &EmbeddingBundle,
    ) -> Result<(), IndexError> {
        let dimension = bundle.dimension();
        if let (Some(index), Some(established_by)) = (&self.index, &self.established_by) {
            if index.dimension() != dimension {
                return Err(IndexError::DimensionMismatch {
                    established_by: established_by.clone(),
                    expected: index.dimension().get(),
                    conflicting: source_file_id.clone(),
                    actual: dimension.get(),
                });
            }
        }
        if ChunkOrdinal::from_offset(bundle.len() - 1).is_none() {
            return Err(IndexError::OrdinalOverflow {
                source_file_id: source_file_id.clone(),
            });
        }

        if self.established_by.is_none() {
            self.established_by = Some(source_file_id.clone());
        }
        let index = self
            .index
            .get_or_insert_with(|| FlatIndex::new(dimension));

        for (offset, vector) in bundle.vectors().iter().enumerate() {
            let ordinal = ChunkOrdinal::from_offset(offset).ok_or_else(|| {
                IndexError::OrdinalOverflow {
                    source_file_id: source_file_id.clone(),
                }
            })?;
            let position = index.add(vector)?;
            let identity_position = self.identities.push(ChunkIdentity {
                source_file_id: source_file_id.clone(),
                ordinal,
            });
            debug_assert_eq!(position, identity_position);
        }

        self.bundle_count += 1;
        tracing::debug!(
            source_file_id = %source_file_id,
            vectors = bundle.len(),
            total = self.identities.len(),
            "Indexed bundle"
        );
        Ok(())
    }

    /// Number of vectors added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Finishes the build. Fails with [`IndexError::EmptyCorpus`] if nothing
    /// was added.
    pub fn finish(self) -> Result<BuiltIndex, IndexError> {
        match self.index {
            Some(index) if !index.is_empty() => Ok(BuiltIndex {
                index,
                identities: self.identities,
                bundle_count: self.bundle_count,
            }),
            _ => Err(IndexError::EmptyCorpus),
        }
    }
}

impl BuiltIndex {
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Writes the index pair and `metadata.json` into `dir` under a fresh
    /// build id.
    pub fn write_to(&self, dir: &Path, model_name: &str) -> Result<IndexMetadata, IndexError> {
        std::fs::create_dir_all(dir).map_err(IndexError::io(dir))?;
        let build_id: u64 = rand::random();

        self.index.write_to(&dir.join(INDEX_FILE), build_id)?;
        self.identities.write_to(&dir.join(IDENTITY_FILE), build_id)?;

        let metadata = IndexMetadata::new(
            model_name,
            self.index.dimension().get(),
            self.index.len(),
            self.bundle_count,
            build_id,
        );
        metadata.save(dir)?;

        tracing::info!(
            vectors = metadata.vector_count,
            bundles = metadata.bundle_count,
            dimension = metadata.dimension,
            build_id = %format!("{build_id:016x}"),
            dir = %dir.display(),
            "Wrote index"
        );
        Ok(metadata)
    }

    /// Serves queries straight from memory, without a round trip through disk.
    #[must_use]
    pub fn into_reader(self) -> IndexReader {
        IndexReader::from_parts(self.index, self.identities)
    }
}
