//! Build summary written next to the index pair.
//!
//! Informational only: the reader never consults it, so a missing or stale
//! summary cannot break queries.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::index::{IndexError, METADATA_FILE};

/// Summary of one index build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Name of the embedding model that produced the vectors
    pub model_name: String,

    pub dimension: usize,

    /// Number of indexed vectors
    pub vector_count: usize,

    /// Number of source files that contributed vectors
    pub bundle_count: usize,

    /// Build id shared by the index and identity artifacts
    pub build_id: u64,

    /// Unix timestamp of the build
    pub created_at: u64,

    /// Version of the metadata format
    pub version: u32,
}

impl IndexMetadata {
    const CURRENT_VERSION: u32 = 1;

    pub fn new(
        model_name: impl Into<String>,
        dimension: usize,
        vector_count: usize,
        bundle_count: usize,
        build_id: u64,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            dimension,
            vector_count,
            bundle_count,
            build_id,
            created_at: u64::try_from(Utc::now().timestamp()).unwrap_or(0),
            version: Self::CURRENT_VERSION,
        }
    }

    /// Build time formatted as `YYYY-MM-DD HH:MM:SS UTC`.
    #[must_use]
    pub fn created_at_display(&self) -> String {
        i64::try_from(self.created_at)
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| self.created_at.to_string())
    }

    /// Save metadata as `metadata.json` in `dir`
    pub fn save(&self, dir: &Path) -> Result<(), IndexError> {
        let path = dir.join(METADATA_FILE);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| IndexError::Serialization(format!("Failed to serialize metadata: {e}")))?;
        std::fs::write(&path, json).map_err(IndexError::io(&path))
    }

    /// Load `metadata.json` from `dir`
    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let path = dir.join(METADATA_FILE);
        if !path.exists() {
            return Err(IndexError::MissingArtifact { path });
        }
        let json = std::fs::read_to_string(&path).map_err(IndexError::io(&path))?;
        let metadata: Self =
            serde_json::from_str(&json).map_err(|e| IndexError::invalid(&path, e.to_string()))?;

        if metadata.version > Self::CURRENT_VERSION {
            return Err(IndexError::invalid(
                &path,
                format!(
                    "metadata version {} is newer than supported version {}",
                    metadata.version,
                    Self::CURRENT_VERSION
                ),
            ));
        }
        Ok(metadata)
    }

    pub fn exists(dir: &Path) -> bool {
        dir.join(METADATA_FILE).exists()
    }
}
