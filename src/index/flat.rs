//! Brute-force index over squared Euclidean distance.
//!
//! # Artifact Format
//!
//! - Header (32 bytes): magic `RFLT`, version u32, dimension u32, metric u32,
//!   vector count u64, build id u64
//! - Vectors: contiguous f32 arrays in little-endian format, insertion order

use std::cmp::Ordering;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use memmap2::MmapOptions;
use rayon::prelude::*;

use crate::index::{IndexError, persist_atomically, require_artifact};
use crate::vector::{VectorDimension, non_finite_component, squared_euclidean};

/// Metric tag stored in the artifact header.
pub const METRIC_SQUARED_L2: u32 = 1;

const INDEX_VERSION: u32 = 1;
const HEADER_SIZE: usize = 32;
const MAGIC_BYTES: &[u8; 4] = b"RFLT";
const BYTES_PER_F32: usize = 4;

/// Exact search structure. Vectors are append-only; position `i` is the
/// `i`-th vector added.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: VectorDimension,
    data: Vec<f32>,
}

impl FlatIndex {
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Appends one vector and returns its position.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize, IndexError> {
        self.check_vector(vector)?;
        let position = self.len();
        self.data.extend_from_slice(vector);
        Ok(position)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension.get()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Vector stored at `position`.
    #[must_use]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let d = self.dimension.get();
        let start = position.checked_mul(d)?;
        self.data.get(start..start + d)
    }

    /// Returns up to `k` `(position, distance)` pairs, nearest first.
    ///
    /// Equal distances are ordered by position, so results are deterministic.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, IndexError> {
        self.check_vector(query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .par_chunks_exact(self.dimension.get())
            .enumerate()
            .map(|(position, row)| (position, squared_euclidean(query, row)))
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, nearest_first);
            scored.truncate(k);
        }
        scored.sort_unstable_by(nearest_first);
        Ok(scored)
    }

    fn check_vector(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dimension.get() {
            return Err(IndexError::WrongDimension {
                expected: self.dimension.get(),
                actual: vector.len(),
            });
        }
        match non_finite_component(vector) {
            Some(component) => Err(IndexError::NonFiniteVector { component }),
            None => Ok(()),
        }
    }

    /// Writes the artifact, tagged with `build_id`.
    pub fn write_to(&self, path: &Path, build_id: u64) -> Result<(), IndexError> {
        let dimension = u32::try_from(self.dimension.get())
            .map_err(|_| IndexError::invalid(path, "dimension does not fit the header"))?;
        persist_atomically(path, |w| {
            w.write_all(MAGIC_BYTES)?;
            w.write_all(&INDEX_VERSION.to_le_bytes())?;
            w.write_all(&dimension.to_le_bytes())?;
            w.write_all(&METRIC_SQUARED_L2.to_le_bytes())?;
            w.write_all(&(self.len() as u64).to_le_bytes())?;
            w.write_all(&build_id.to_le_bytes())?;
            for value in &self.data {
                w.write_all(&value.to_le_bytes())?;
            }
            Ok(())
        })
    }

    /// Reads an artifact written by [`FlatIndex::write_to`]. Returns the index
    /// and its build id.
    pub fn read_from(path: &Path) -> Result<(Self, u64), IndexError> {
        require_artifact(path)?;
        let file = File::open(path).map_err(IndexError::io(path))?;
        let file_len = file.metadata().map_err(IndexError::io(path))?.len() as usize;
        if file_len < HEADER_SIZE {
            return Err(IndexError::invalid(
                path,
                "file too small to contain header",
            ));
        }

        // SAFETY: artifacts are replaced by rename, never modified in place.
        let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(IndexError::io(path))?;

        if &mmap[0..4] != MAGIC_BYTES {
            return Err(IndexError::invalid(path, "invalid magic bytes"));
        }
        let version = u32::from_le_bytes(header_bytes(&mmap, 4));
        if version != INDEX_VERSION {
            return Err(IndexError::invalid(
                path,
                format!("unsupported version {version}, expected {INDEX_VERSION}"),
            ));
        }
        let dimension = u32::from_le_bytes(header_bytes(&mmap, 8)) as usize;
        let dimension = VectorDimension::new(dimension)
            .map_err(|e| IndexError::invalid(path, e.to_string()))?;
        let metric = u32::from_le_bytes(header_bytes(&mmap, 12));
        if metric != METRIC_SQUARED_L2 {
            return Err(IndexError::invalid(
                path,
                format!("unsupported metric {metric}"),
            ));
        }
        let count = u64::from_le_bytes(header_bytes(&mmap, 16));
        let build_id = u64::from_le_bytes(header_bytes(&mmap, 24));

        let expected_len = usize::try_from(count)
            .ok()
            .and_then(|c| c.checked_mul(dimension.get()))
            .and_then(|n| n.checked_mul(BYTES_PER_F32))
            .and_then(|n| n.checked_add(HEADER_SIZE))
            .ok_or_else(|| IndexError::invalid(path, "header sizes overflow"))?;
        if mmap.len() != expected_len {
            return Err(IndexError::invalid(
                path,
                format!(
                    "expected {expected_len} bytes for {count} vectors of dimension {dimension}, found {}",
                    mmap.len()
                ),
            ));
        }

        let data: Vec<f32> = mmap[HEADER_SIZE..]
            .chunks_exact(BYTES_PER_F32)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        if let Some(offset) = non_finite_component(&data) {
            return Err(IndexError::invalid(
                path,
                format!(
                    "vector {} holds a NaN or infinite value",
                    offset / dimension.get()
                ),
            ));
        }

        Ok((Self { dimension, data }, build_id))
    }
}

fn nearest_first(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
}

fn header_bytes<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}
