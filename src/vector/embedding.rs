//! Embedding generation for chunk text.
//!
//! The embedding model is an external capability: anything that maps a batch
//! of texts to equal-length vectors can sit behind [`EmbeddingGenerator`].
//! The production implementation wraps fastembed; the default model is
//! AllMiniLML6V2, which produces 384-dimensional vectors.

use crate::vector::{VectorDimension, VectorError};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::Path;
use std::sync::Mutex;

/// Model names accepted by [`parse_embedding_model`].
pub const SUPPORTED_MODELS: &[&str] = &[
    "AllMiniLML6V2",
    "AllMiniLML12V2",
    "BGESmallENV15",
    "BGEBaseENV15",
    "BGELargeENV15",
    "MultilingualE5Small",
    "MultilingualE5Base",
    "NomicEmbedTextV15",
];

/// Trait for generating embeddings from text.
///
/// Implementations of this trait should be thread-safe and
/// capable of handling batch processing efficiently.
pub trait EmbeddingGenerator: Send + Sync {
    /// Generate embeddings for multiple texts.
    ///
    /// # Arguments
    /// * `texts` - Slice of text strings to generate embeddings for
    ///
    /// # Returns
    /// A vector of embeddings, one for each input text, or an error
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Get the dimension of embeddings produced by this generator.
    #[must_use]
    fn dimension(&self) -> VectorDimension;

    /// Human-readable name of the underlying model.
    fn model_name(&self) -> String;
}

/// FastEmbed-backed generator.
///
/// The model is held behind a mutex because fastembed sessions take `&mut self`.
pub struct FastEmbedGenerator {
    model: Mutex<TextEmbedding>,
    model_kind: EmbeddingModel,
    dimension: VectorDimension,
}

impl std::fmt::Debug for FastEmbedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedGenerator")
            .field("model", &model_to_string(&self.model_kind))
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedGenerator {
    /// Create a generator for a specific model.
    ///
    /// The output dimension is probed by embedding a short test string, so the
    /// generator never has to carry a hard-coded dimension table.
    ///
    /// # Errors
    /// Returns an error if the model fails to initialize or download.
    pub fn with_model(
        model_kind: EmbeddingModel,
        cache_dir: &Path,
        show_download_progress: bool,
    ) -> Result<Self, VectorError> {
        tracing::info!(
            model = %model_to_string(&model_kind),
            cache_dir = %cache_dir.display(),
            "Loading embedding model"
        );

        let mut model = TextEmbedding::try_new(
            InitOptions::new(model_kind.clone())
                .with_cache_dir(cache_dir.to_path_buf())
                .with_show_download_progress(show_download_progress),
        )
        .map_err(|e| VectorError::EmbeddingFailed(
            format!("Failed to initialize embedding model: {e}. Ensure you have internet connection for first-time model download")
        ))?;

        let probe = model
            .embed(vec!["test"], None)
            .map_err(|e| VectorError::EmbeddingFailed(format!("Failed to probe model: {e}")))?;
        let probed = probe.first().map(Vec::len).unwrap_or(0);
        let dimension = VectorDimension::new(probed)?;

        tracing::debug!(dimension = dimension.get(), "Embedding model ready");

        Ok(Self {
            model: Mutex::new(model),
            model_kind,
            dimension,
        })
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // fastembed takes owned strings
        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                VectorError::EmbeddingFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(text_strings, None)
            .map_err(|e| {
                VectorError::EmbeddingFailed(format!("Failed to generate embeddings: {e}"))
            })?;

        for embedding in &embeddings {
            self.dimension.validate_vector(embedding)?;
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> String {
        model_to_string(&self.model_kind)
    }
}

/// Parse a model name from settings into a fastembed model.
///
/// Matching is case-insensitive and ignores `-`, `_` and `.`, so
/// `bge-small-en-v1.5` and `BGESmallENV15` are the same model.
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, VectorError> {
    let normalized: String = name
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | '.'))
        .collect::<String>()
        .to_ascii_lowercase();

    let model = match normalized.as_str() {
        "allminilml6v2" => EmbeddingModel::AllMiniLML6V2,
        "allminilml12v2" => EmbeddingModel::AllMiniLML12V2,
        "bgesmallenv15" => EmbeddingModel::BGESmallENV15,
        "bgebaseenv15" => EmbeddingModel::BGEBaseENV15,
        "bgelargeenv15" => EmbeddingModel::BGELargeENV15,
        "multilinguale5small" => EmbeddingModel::MultilingualE5Small,
        "multilinguale5base" => EmbeddingModel::MultilingualE5Base,
        "nomicembedtextv15" => EmbeddingModel::NomicEmbedTextV15,
        _ => {
            return Err(VectorError::UnknownModel {
                name: name.to_string(),
                supported: SUPPORTED_MODELS.join(", "),
            });
        }
    };

    Ok(model)
}

/// Canonical settings name for a fastembed model.
#[must_use]
pub fn model_to_string(model: &EmbeddingModel) -> String {
    match model {
        EmbeddingModel::AllMiniLML6V2 => "AllMiniLML6V2",
        EmbeddingModel::AllMiniLML12V2 => "AllMiniLML12V2",
        EmbeddingModel::BGESmallENV15 => "BGESmallENV15",
        EmbeddingModel::BGEBaseENV15 => "BGEBaseENV15",
        EmbeddingModel::BGELargeENV15 => "BGELargeENV15",
        EmbeddingModel::MultilingualE5Small => "MultilingualE5Small",
        EmbeddingModel::MultilingualE5Base => "MultilingualE5Base",
        EmbeddingModel::NomicEmbedTextV15 => "NomicEmbedTextV15",
        other => return format!("{other:?}"),
    }
    .to_string()
}

/// Mock embedding generator for testing.
///
/// Produces deterministic vectors from the bytes of each text, so equal texts
/// always map to equal vectors. Texts containing `fail_marker` make the whole
/// batch fail, which lets tests exercise per-batch error reporting.
#[cfg(test)]
pub struct MockEmbeddingGenerator {
    dimension: VectorDimension,
    fail_marker: Option<String>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockEmbeddingGenerator {
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: VectorDimension::new(dimension).unwrap(),
            fail_marker: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    /// Number of `generate_embeddings` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn embed_one(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0f32; dimension];
        for (i, byte) in text.bytes().enumerate() {
            embedding[i % dimension] += f32::from(byte) / 255.0;
        }
        embedding[0] += text.len() as f32;
        embedding
    }
}

#[cfg(test)]
impl EmbeddingGenerator for MockEmbeddingGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if let Some(marker) = &self.fail_marker {
            if texts.iter().any(|t| t.contains(marker.as_str())) {
                return Err(VectorError::EmbeddingFailed(format!(
                    "mock backend refused text containing '{marker}'"
                )));
            }
        }
        Ok(texts
            .iter()
            .map(|text| Self::embed_one(text, self.dimension.get()))
            .collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> String {
        "mock".to_string()
    }
}
