//! Position → chunk identity mapping, persisted with `bincode`.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::index::{IndexError, persist_atomically, require_artifact};
use crate::types::{ChunkOrdinal, SourceFileId};

const IDENTITY_VERSION: u32 = 1;

/// Upper bound on decoded table size; guards allocation on corrupt input.
const DECODE_LIMIT: usize = 1 << 30;

/// Where an indexed vector came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkIdentity {
    pub source_file_id: SourceFileId,
    pub ordinal: ChunkOrdinal,
}

/// `entries[i]` identifies the vector at index position `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityTable {
    entries: Vec<ChunkIdentity>,
}

#[derive(bincode::Encode, bincode::Decode)]
struct PersistedTable {
    version: u32,
    build_id: u64,
    entries: Vec<PersistedIdentity>,
}

#[derive(bincode::Encode, bincode::Decode)]
struct PersistedIdentity {
    source_file_id: String,
    ordinal: u32,
}

impl IdentityTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an identity and returns its position.
    pub fn push(&mut self, identity: ChunkIdentity) -> usize {
        self.entries.push(identity);
        self.entries.len() - 1
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&ChunkIdentity> {
        self.entries.get(position)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChunkIdentity> {
        self.entries.iter()
    }

    /// Writes the table, tagged with `build_id`.
    pub fn write_to(&self, path: &Path, build_id: u64) -> Result<(), IndexError> {
        let persisted = PersistedTable {
            version: IDENTITY_VERSION,
            build_id,
            entries: self
                .entries
                .iter()
                .map(|e| PersistedIdentity {
                    source_file_id: e.source_file_id.as_str().to_string(),
                    ordinal: e.ordinal.get(),
                })
                .collect(),
        };
        let bytes = bincode::encode_to_vec(&persisted, bincode::config::standard())
            .map_err(|e| IndexError::Serialization(e.to_string()))?;

        persist_atomically(path, |w| w.write_all(&bytes))
    }

    /// Reads a table written by [`IdentityTable::write_to`]. Returns the table
    /// and its build id.
    pub fn read_from(path: &Path) -> Result<(Self, u64), IndexError> {
        require_artifact(path)?;
        let bytes = std::fs::read(path).map_err(IndexError::io(path))?;

        let config = bincode::config::standard().with_limit::<DECODE_LIMIT>();
        let (persisted, consumed): (PersistedTable, usize) =
            bincode::decode_from_slice(&bytes, config)
                .map_err(|e| IndexError::invalid(path, e.to_string()))?;
        if consumed != bytes.len() {
            return Err(IndexError::invalid(
                path,
                format!("{} trailing bytes", bytes.len() - consumed),
            ));
        }
        if persisted.version != IDENTITY_VERSION {
            return Err(IndexError::invalid(
                path,
                format!(
                    "unsupported version {}, expected {IDENTITY_VERSION}",
                    persisted.version
                ),
            ));
        }

        let entries = persisted
            .entries
            .into_iter()
            .enumerate()
            .map(|(position, entry)| {
                let source_file_id = SourceFileId::new(entry.source_file_id)
                    .map_err(|e| IndexError::invalid(path, format!("entry {position}: {e}")))?;
                let ordinal = ChunkOrdinal::new(entry.ordinal).ok_or_else(|| {
                    IndexError::invalid(path, format!("entry {position}: ordinal is zero"))
                })?;
                Ok(ChunkIdentity {
                    source_file_id,
                    ordinal,
                })
            })
            .collect::<Result<Vec<_>, IndexError>>()?;

        Ok((Self { entries }, persisted.build_id))
    }
}
