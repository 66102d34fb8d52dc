//! One memory-mapped bundle file per source file.
//!
//! # Bundle Format
//!
//! - Header (16 bytes): magic `EBND`, version, dimension, vector count
//! - Vectors: contiguous f32 arrays in little-endian format, chunk order
//!
//! Writes go to a temporary file in the store directory and are renamed into
//! place, so a crash mid-write leaves the previous bundle intact.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::MmapOptions;
use tempfile::NamedTempFile;

use crate::store::{BundleFailure, BundleStore, EmbeddingBundle, LoadedBundles, StoreError};
use crate::types::SourceFileId;

/// File name suffix appended to the source file id.
pub const BUNDLE_FILE_SUFFIX: &str = "_embeddings.vec";

const BUNDLE_VERSION: u32 = 1;
const HEADER_SIZE: usize = 16;
const MAGIC_BYTES: &[u8; 4] = b"EBND";
const BYTES_PER_F32: usize = 4;

/// Bundle store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileBundleStore {
    root: PathBuf,
}

impl FileBundleStore {
    /// Creates a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the bundle file for `key`.
    #[must_use]
    pub fn bundle_path(&self, key: &SourceFileId) -> PathBuf {
        self.root.join(format!("{key}{BUNDLE_FILE_SUFFIX}"))
    }

    fn ensure_root(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.root).map_err(|source| StoreError::Write {
            path: self.root.clone(),
            source,
        })
    }

    /// Lists `(raw_key, path)` for every bundle file in the root.
    ///
    /// A missing root is an empty store.
    fn bundle_files(&self) -> Result<Vec<(String, PathBuf)>, StoreError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.root.clone(),
                    source,
                });
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Read {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(raw_key) = name.strip_suffix(BUNDLE_FILE_SUFFIX) {
                files.push((raw_key.to_string(), path));
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }
}

impl BundleStore for FileBundleStore {
    fn put(&self, key: &SourceFileId, bundle: &EmbeddingBundle) -> Result<(), StoreError> {
        let header = BundleHeader::for_bundle(bundle)?;
        self.ensure_root()?;
        let path = self.bundle_path(key);
        let write_err = |source: io::Error| StoreError::Write {
            path: path.clone(),
            source,
        };

        let temp = NamedTempFile::new_in(&self.root).map_err(write_err)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            write_bundle(&mut writer, header, bundle).map_err(write_err)?;
            writer.flush().map_err(write_err)?;
        }
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist(&path).map_err(|e| write_err(e.error))?;

        tracing::debug!(
            key = %key,
            vectors = bundle.len(),
            dimension = bundle.dimension().get(),
            path = %path.display(),
            "Wrote embedding bundle"
        );
        Ok(())
    }

    fn get(&self, key: &SourceFileId) -> Result<Option<EmbeddingBundle>, StoreError> {
        let path = self.bundle_path(key);
        if !path.exists() {
            return Ok(None);
        }
        read_bundle(&path).map(Some)
    }

    fn get_all(&self) -> Result<LoadedBundles, StoreError> {
        let mut loaded = LoadedBundles::default();

        for (raw_key, path) in self.bundle_files()? {
            let key = match SourceFileId::new(raw_key.as_str()) {
                Ok(key) => key,
                Err(e) => {
                    loaded.failures.push(BundleFailure {
                        key: raw_key,
                        error: e.into(),
                    });
                    continue;
                }
            };

            match read_bundle(&path) {
                Ok(bundle) => {
                    loaded.bundles.insert(key, bundle);
                }
                Err(error) => loaded.failures.push(BundleFailure {
                    key: raw_key,
                    error,
                }),
            }
        }

        Ok(loaded)
    }

    fn remove(&self, key: &SourceFileId) -> Result<bool, StoreError> {
        let path = self.bundle_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Write { path, source }),
        }
    }

    fn keys(&self) -> Result<Vec<SourceFileId>, StoreError> {
        Ok(self
            .bundle_files()?
            .into_iter()
            .filter_map(|(raw_key, _)| SourceFileId::new(raw_key).ok())
            .collect())
    }
}

/// Header fields that must fit the on-disk `u32` slots.
#[derive(Debug, Clone, Copy)]
struct BundleHeader {
    dimension: u32,
    count: u32,
}

impl BundleHeader {
    fn for_bundle(bundle: &EmbeddingBundle) -> Result<Self, StoreError> {
        let too_large = || StoreError::TooLarge {
            vectors: bundle.len(),
            dimension: bundle.dimension().get(),
        };
        Ok(Self {
            dimension: u32::try_from(bundle.dimension().get()).map_err(|_| too_large())?,
            count: u32::try_from(bundle.len()).map_err(|_| too_large())?,
        })
    }
}

fn write_bundle(
    writer: &mut impl Write,
    header: BundleHeader,
    bundle: &EmbeddingBundle,
) -> io::Result<()> {
    writer.write_all(MAGIC_BYTES)?;
    writer.write_all(&BUNDLE_VERSION.to_le_bytes())?;
    writer.write_all(&header.dimension.to_le_bytes())?;
    writer.write_all(&header.count.to_le_bytes())?;

    for vector in bundle.vectors() {
        for &value in vector {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    Ok(())
}

fn read_bundle(path: &Path) -> Result<EmbeddingBundle, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };
    let read_err = |source: io::Error| StoreError::Read {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(read_err)?;
    let file_len = file.metadata().map_err(read_err)?.len() as usize;
    if file_len < HEADER_SIZE {
        return Err(corrupt(format!(
            "file is {file_len} bytes, smaller than the {HEADER_SIZE}-byte header"
        )));
    }

    // SAFETY: the file is only replaced by rename, never modified in place.
    let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(read_err)?;

    if &mmap[0..4] != MAGIC_BYTES {
        return Err(corrupt("invalid magic bytes".to_string()));
    }
    let version = read_u32(&mmap, 4);
    if version != BUNDLE_VERSION {
        return Err(corrupt(format!(
            "unsupported version {version}, expected {BUNDLE_VERSION}"
        )));
    }
    let dimension = read_u32(&mmap, 8) as usize;
    let count = read_u32(&mmap, 12) as usize;
    if dimension == 0 || count == 0 {
        return Err(corrupt(format!(
            "header declares {count} vectors of dimension {dimension}"
        )));
    }

    let expected_len = dimension
        .checked_mul(count)
        .and_then(|n| n.checked_mul(BYTES_PER_F32))
        .and_then(|n| n.checked_add(HEADER_SIZE))
        .ok_or_else(|| corrupt("header sizes overflow".to_string()))?;
    if mmap.len() != expected_len {
        return Err(corrupt(format!(
            "expected {expected_len} bytes for {count} vectors of dimension {dimension}, found {}",
            mmap.len()
        )));
    }

    let vectors = mmap[HEADER_SIZE..]
        .chunks_exact(dimension * BYTES_PER_F32)
        .map(|row| {
            row.chunks_exact(BYTES_PER_F32)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        })
        .collect();

    EmbeddingBundle::new(vectors).map_err(|e| corrupt(e.to_string()))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
