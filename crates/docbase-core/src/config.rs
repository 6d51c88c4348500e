//! Configuration and data directory management.
//!
//! All settings are loaded once at startup and handed to services as
//! explicit references. Callers that need per-request overrides (e.g. a
//! session's system prompt) pass them as arguments on top of these
//! defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Paths to all docbase data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite database directory (`data/db/`).
    pub db: PathBuf,
    /// Uploaded document files (`data/uploads/`).
    pub uploads: PathBuf,
    /// Scratch space for OCR inputs (`data/tmp/`).
    pub tmp: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            db: root.join("db"),
            uploads: root.join("uploads"),
            tmp: root.join("tmp"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.db)?;
        std::fs::create_dir_all(&self.uploads)?;
        std::fs::create_dir_all(&self.tmp)?;
        Ok(())
    }
}

/// Remote embedding endpoint settings plus the chunking parameters used
/// when a document is prepared for retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub chunk_overlap: usize,
    /// Pause between sequential embedding calls, as courtesy rate limiting.
    pub batch_delay_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/embeddings".into(),
            model: "nomic-embed-text".into(),
            timeout_secs: 60,
            chunk_size: 512,
            chunk_overlap: 50,
            batch_delay_ms: 100,
        }
    }
}

/// Remote generation endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f64,
    /// How many retrieved chunks a RAG turn uses by default.
    pub default_top_k: usize,
    pub system_prompt: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/generate".into(),
            model: "llama3.1:8b".into(),
            timeout_secs: 120,
            max_tokens: 4000,
            temperature: 0.3,
            default_top_k: 5,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant for the organisation's \
document library. Answer questions using the supplied document context where \
available, keep answers factual, and say so when the documents do not contain \
the answer.";

/// Remote vision-OCR endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/generate".into(),
            model: "llama3.2-vision:11b".into(),
            timeout_secs: 120,
        }
    }
}

/// Top-level docbase configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Maximum accepted upload size in megabytes.
    pub max_upload_mb: u64,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub ocr: OcrConfig,
}

impl AppConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = env_parse("DOCBASE_PORT", 3010);
        let data_paths = DataPaths::new(data_dir)?;

        let mut embedding = EmbeddingConfig::default();
        if let Ok(url) = std::env::var("DOCBASE_EMBEDDING_URL") {
            embedding.endpoint = url;
        }
        if let Ok(model) = std::env::var("DOCBASE_EMBEDDING_MODEL") {
            embedding.model = model;
        }
        embedding.chunk_size = env_parse("DOCBASE_CHUNK_SIZE", embedding.chunk_size);
        embedding.chunk_overlap = env_parse("DOCBASE_CHUNK_OVERLAP", embedding.chunk_overlap);

        let mut generation = GenerationConfig::default();
        if let Ok(url) = std::env::var("DOCBASE_GENERATION_URL") {
            generation.endpoint = url;
        }
        if let Ok(model) = std::env::var("DOCBASE_GENERATION_MODEL") {
            generation.model = model;
        }
        generation.temperature = env_parse("DOCBASE_TEMPERATURE", generation.temperature);
        generation.max_tokens = env_parse("DOCBASE_MAX_TOKENS", generation.max_tokens);
        if let Ok(prompt) = std::env::var("DOCBASE_SYSTEM_PROMPT") {
            generation.system_prompt = prompt;
        }

        let mut ocr = OcrConfig::default();
        if let Ok(url) = std::env::var("DOCBASE_OCR_URL") {
            ocr.endpoint = url;
        }
        if let Ok(model) = std::env::var("DOCBASE_OCR_MODEL") {
            ocr.model = model;
        }

        Ok(Self {
            port,
            data_paths,
            max_upload_mb: env_parse("DOCBASE_MAX_UPLOAD_MB", 200),
            embedding,
            generation,
            ocr,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
