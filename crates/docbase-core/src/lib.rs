//! docbase-core: shared configuration and error types.

pub mod config;
pub mod error;

pub use config::{AppConfig, DataPaths, EmbeddingConfig, GenerationConfig, OcrConfig};
pub use error::{Error, Result};

/// Current unix time in milliseconds. Timestamp convention for all store rows.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
