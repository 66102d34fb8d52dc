//! Configuration for the embedding and indexing pipeline.
//!
//! Settings are layered:
//! - Default values
//! - TOML configuration file (`.ragdex/settings.toml`, found by walking up
//!   from the current directory)
//! - Environment variable overrides
//! - CLI argument overrides (applied by the binary)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `RAGDEX_` and use double
//! underscores to separate nested levels:
//! - `RAGDEX_EMBEDDING__BATCH_SIZE=64` sets `embedding.batch_size`
//! - `RAGDEX_PATHS__INDEX_DIR=/srv/index` sets `paths.index_dir`
//! - `RAGDEX_DEBUG=true` sets `debug`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::vector::DEFAULT_BATCH_SIZE;

/// Directory holding the settings file, relative to the workspace root.
pub const CONFIG_DIR: &str = ".ragdex";
const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "RAGDEX_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Global debug logging
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Directory containing `.ragdex`; relative paths resolve against it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PathsConfig {
    /// Chunk files, one chunk per line
    #[serde(default = "default_chunks_dir")]
    pub chunks_dir: PathBuf,

    /// Embedding bundles, one file per source file
    #[serde(default = "default_embeddings_dir")]
    pub embeddings_dir: PathBuf,

    /// Index pair and build metadata
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmbeddingConfig {
    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Chunks per embedding call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Encode batches concurrently
    #[serde(default = "default_false")]
    pub parallel_batches: bool,

    /// Worker threads when `parallel_batches` is on
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Where downloaded model files are cached
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Show progress bars while encoding
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SearchConfig {
    /// Results returned by `query` when `-k` is not given
    #[serde(default = "default_k")]
    pub default_k: usize,
}

fn default_version() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_chunks_dir() -> PathBuf {
    PathBuf::from("data/processed/chunks")
}
fn default_embeddings_dir() -> PathBuf {
    PathBuf::from("data/processed/embeddings")
}
fn default_index_dir() -> PathBuf {
    PathBuf::from("data/processed/index")
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_threads() -> usize {
    num_cpus::get()
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from(".ragdex/models")
}
fn default_k() -> usize {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            debug: false,
            workspace_root: None,
            paths: PathsConfig::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            chunks_dir: default_chunks_dir(),
            embeddings_dir: default_embeddings_dir(),
            index_dir: default_index_dir(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            batch_size: default_batch_size(),
            parallel_batches: false,
            threads: default_threads(),
            cache_dir: default_cache_dir(),
            show_progress: true,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
        }
    }
}

/// `RAGDEX_EMBEDDING__BATCH_SIZE` -> `embedding.batch_size`
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| key.as_str().to_lowercase().replace("__", ".").into())
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));

        Self::load_from(config_path).map(|mut settings| {
            if settings.workspace_root.is_none() {
                settings.workspace_root = Self::workspace_root();
            }
            settings
        })
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(env_provider())
            .extract()
            .map_err(Box::new)
    }

    /// Find `.ragdex/settings.toml` from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Get the workspace root directory (where `.ragdex` is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Check if configuration is properly initialized
    pub fn check_init() -> Result<(), String> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));

        if !config_path.exists() {
            return Err("No configuration file found".to_string());
        }

        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| format!("Cannot read configuration file: {e}"))?;
        toml::from_str::<Settings>(&content).map_err(|e| {
            format!("Configuration file is corrupted: {e}\nRun 'ragdex init --force' to regenerate.")
        })?;

        Ok(())
    }

    /// Resolve a configured path against the workspace root.
    ///
    /// Absolute paths are returned unchanged; relative paths stay relative
    /// when no workspace root is known.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.workspace_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create `.ragdex/settings.toml` in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Self::init_config_file_at(Path::new("."), force)
    }

    /// Create a commented default settings file under `root/.ragdex`
    pub fn init_config_file_at(
        root: &Path,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = format!(
            r#"# ragdex configuration file

# Version of the configuration schema
version = 1

# Debug logging (same as --debug)
debug = false

[paths]
# Chunk files: one *.txt per source document, one chunk per line
chunks_dir = "data/processed/chunks"

# Embedding bundles, one <source file>_embeddings.vec per source document
embeddings_dir = "data/processed/embeddings"

# Index pair (index.flat + identities.bin) and metadata.json
index_dir = "data/processed/index"

[embedding]
# Model to use for embeddings
model = "AllMiniLML6V2"

# Chunks sent to the model per call
batch_size = {batch_size}

# Encode batches on a thread pool (results keep input order)
parallel_batches = false

# Worker threads for parallel batches (defaults to CPU count)
# threads = {threads}

# Model download cache
cache_dir = ".ragdex/models"

# Progress bars while encoding
show_progress = true

[search]
# Results per query when -k is not given
default_k = 5
"#,
            batch_size = DEFAULT_BATCH_SIZE,
            threads = num_cpus::get()
        );

        std::fs::write(&config_path, template)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(
            settings.paths.chunks_dir,
            PathBuf::from("data/processed/chunks")
        );
        assert_eq!(settings.embedding.model, "AllMiniLML6V2");
        assert_eq!(settings.embedding.batch_size, 32);
        assert!(settings.embedding.threads > 0);
        assert_eq!(settings.search.default_k, 5);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2

[embedding]
batch_size = 8
parallel_batches = true
threads = 4

[paths]
index_dir = "/srv/ragdex/index"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.embedding.batch_size, 8);
        assert!(settings.embedding.parallel_batches);
        assert_eq!(settings.embedding.threads, 4);
        assert_eq!(settings.paths.index_dir, PathBuf::from("/srv/ragdex/index"));
        // Untouched sections keep defaults
        assert_eq!(
            settings.paths.embeddings_dir,
            PathBuf::from("data/processed/embeddings")
        );
        assert_eq!(settings.search.default_k, 5);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.embedding.batch_size = 2;
        settings.search.default_k = 9;
        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.embedding.batch_size, 2);
        assert_eq!(loaded.search.default_k, 9);
    }

    #[test]
    fn test_init_template_parses_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = Settings::init_config_file_at(temp_dir.path(), false).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let parsed: Settings = toml::from_str(&content).unwrap();
        assert_eq!(parsed.paths, PathsConfig::default());
        assert_eq!(parsed.embedding.batch_size, DEFAULT_BATCH_SIZE);

        assert!(Settings::init_config_file_at(temp_dir.path(), false).is_err());
        assert!(Settings::init_config_file_at(temp_dir.path(), true).is_ok());
    }

    #[test]
    fn test_resolve_against_workspace_root() {
        let settings = Settings {
            workspace_root: Some(PathBuf::from("/work")),
            ..Settings::default()
        };
        assert_eq!(
            settings.resolve(Path::new("data/index")),
            PathBuf::from("/work/data/index")
        );
        assert_eq!(
            settings.resolve(Path::new("/abs/index")),
            PathBuf::from("/abs/index")
        );
        assert_eq!(
            Settings::default().resolve(Path::new("data/index")),
            PathBuf::from("data/index")
        );
    }

    #[test]
    fn test_layered_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(
            &config_path,
            "[embedding]\ncache_dir = \"/file/models\"\nshow_progress = false\n",
        )
        .unwrap();

        // Keys no other test asserts on, so parallel tests are unaffected
        unsafe {
            std::env::set_var("RAGDEX_EMBEDDING__CACHE_DIR", "/env/models");
            std::env::set_var("RAGDEX_PATHS__CHUNKS_DIR", "/env/chunks");
        }

        let settings = Settings::load_from(&config_path).unwrap();

        // Environment overrides the file
        assert_eq!(settings.embedding.cache_dir, PathBuf::from("/env/models"));
        // File value used when no env var
        assert!(!settings.embedding.show_progress);
        // Env var sets a value absent from the file
        assert_eq!(settings.paths.chunks_dir, PathBuf::from("/env/chunks"));

        unsafe {
            std::env::remove_var("RAGDEX_EMBEDDING__CACHE_DIR");
            std::env::remove_var("RAGDEX_PATHS__CHUNKS_DIR");
        }
    }
}
