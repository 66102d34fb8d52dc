#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use ragdex::vector::{EmbeddingGenerator, VectorDimension, VectorError};
use tempfile::TempDir;

/// Workspace with chunk, embedding and index directories.
pub struct TestProject {
    pub dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn chunks_dir(&self) -> PathBuf {
        self.dir.path().join("chunks")
    }

    pub fn embeddings_dir(&self) -> PathBuf {
        self.dir.path().join("embeddings")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.dir.path().join("index")
    }

    /// Writes a chunk file, one chunk per line.
    pub fn add_chunk_file(&self, name: &str, lines: &[&str]) -> PathBuf {
        let dir = self.chunks_dir();
        fs::create_dir_all(&dir).expect("Failed to create chunks dir");
        let path = dir.join(name);
        fs::write(&path, lines.join("\n")).expect("Failed to write chunk file");
        path
    }
}

/// Generator returning a fixed vector per known text.
pub struct LookupGenerator {
    vectors: HashMap<String, Vec<f32>>,
    dimension: VectorDimension,
}

impl LookupGenerator {
    pub fn new(entries: &[(&str, &[f32])]) -> Self {
        let dimension = VectorDimension::new(entries[0].1.len()).expect("non-zero dimension");
        let vectors = entries
            .iter()
            .map(|(text, v)| (text.to_string(), v.to_vec()))
            .collect();
        Self { vectors, dimension }
    }
}

impl EmbeddingGenerator for LookupGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        texts
            .iter()
            .map(|text| {
                self.vectors.get(*text).cloned().ok_or_else(|| {
                    VectorError::EmbeddingFailed(format!("no vector for '{text}'"))
                })
            })
            .collect()
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> String {
        "LookupModel".to_string()
    }
}

/// Generator deriving a vector from the bytes of each text.
pub struct HashGenerator {
    dimension: VectorDimension,
}

impl HashGenerator {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: VectorDimension::new(dimension).expect("non-zero dimension"),
        }
    }

    pub fn embed(text: &str, dimension: usize) -> Vec<f32> {
        let mut vector = vec![0.0f32; dimension];
        for (i, byte) in text.bytes().enumerate() {
            vector[(i * 7 + byte as usize) % dimension] += f32::from(byte) / 127.0;
        }
        vector
    }
}

impl EmbeddingGenerator for HashGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        Ok(texts
            .iter()
            .map(|t| Self::embed(t, self.dimension.get()))
            .collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> String {
        "HashModel".to_string()
    }
}
