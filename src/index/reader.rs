//! Loading an index pair and answering nearest-neighbor queries.

use std::path::Path;

use serde::Serialize;

use crate::index::{
    ChunkIdentity, FlatIndex, IDENTITY_FILE, INDEX_FILE, IdentityTable, IndexError,
};
use crate::types::{ChunkOrdinal, SourceFileId};
use crate::vector::VectorDimension;

/// One query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub source_file_id: SourceFileId,
    pub ordinal: ChunkOrdinal,
    /// Squared Euclidean distance to the query
    pub distance: f32,
}

/// A validated index pair.
#[derive(Debug)]
pub struct IndexReader {
    index: FlatIndex,
    identities: IdentityTable,
}

impl IndexReader {
    /// Loads `index.flat` and `identities.bin` from `dir`.
    ///
    /// Fails if either artifact is missing or unreadable, if their counts
    /// differ, or if they were written by different builds.
    pub fn open(dir: &Path) -> Result<Self, IndexError> {
        let (index, index_build) = FlatIndex::read_from(&dir.join(INDEX_FILE))?;
        let (identities, identity_build) = IdentityTable::read_from(&dir.join(IDENTITY_FILE))?;

        if index.len() != identities.len() {
            return Err(IndexError::CountMismatch {
                index_count: index.len(),
                identity_count: identities.len(),
            });
        }
        if index_build != identity_build {
            return Err(IndexError::BuildMismatch {
                index_build,
                identity_build,
            });
        }

        tracing::debug!(
            vectors = index.len(),
            dimension = index.dimension().get(),
            dir = %dir.display(),
            "Opened index"
        );
        Ok(Self { index, identities })
    }

    pub(crate) fn from_parts(index: FlatIndex, identities: IdentityTable) -> Self {
        debug_assert_eq!(index.len(), identities.len());
        Self { index, identities }
    }

    /// Up to `k` nearest chunks by squared Euclidean distance, nearest first.
    ///
    /// Ties go to the vector inserted first. `k` larger than the index returns
    /// every vector; `k == 0` returns nothing.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        self.index
            .search(vector, k)?
            .into_iter()
            .map(|(position, distance)| {
                let identity = self.identities.get(position).ok_or_else(|| {
                    IndexError::CountMismatch {
                        index_count: self.index.len(),
                        identity_count: self.identities.len(),
                    }
                })?;
                Ok(SearchHit {
                    source_file_id: identity.source_file_id.clone(),
                    ordinal: identity.ordinal,
                    distance,
                })
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.index.dimension()
    }

    /// Identity of the vector at `position`.
    #[must_use]
    pub fn identity(&self, position: usize) -> Option<&ChunkIdentity> {
        self.identities.get(position)
    }
}
