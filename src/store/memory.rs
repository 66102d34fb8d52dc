//! In-memory bundle store.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::store::{BundleStore, EmbeddingBundle, LoadedBundles, StoreError};
use crate::types::SourceFileId;

/// Bundle store backed by a map. Useful for tests and one-shot pipelines.
#[derive(Debug, Default)]
pub struct MemoryBundleStore {
    bundles: RwLock<BTreeMap<SourceFileId, EmbeddingBundle>>,
}

impl MemoryBundleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bundles.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bundles.read().is_empty()
    }
}

impl BundleStore for MemoryBundleStore {
    fn put(&self, key: &SourceFileId, bundle: &EmbeddingBundle) -> Result<(), StoreError> {
        self.bundles.write().insert(key.clone(), bundle.clone());
        Ok(())
    }

    fn get(&self, key: &SourceFileId) -> Result<Option<EmbeddingBundle>, StoreError> {
        Ok(self.bundles.read().get(key).cloned())
    }

    fn get_all(&self) -> Result<LoadedBundles, StoreError> {
        Ok(LoadedBundles {
            bundles: self.bundles.read().clone(),
            failures: Vec::new(),
        })
    }

    fn remove(&self, key: &SourceFileId) -> Result<bool, StoreError> {
        Ok(self.bundles.write().remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<SourceFileId>, StoreError> {
        Ok(self.bundles.read().keys().cloned().collect())
    }
}
