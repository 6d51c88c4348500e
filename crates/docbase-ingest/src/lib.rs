//! docbase-ingest: upload validation, text extraction, and chunking.

pub mod chunking;
pub mod extract;
pub mod upload;

pub use chunking::{chunk_spans, chunk_text, ChunkSpan};
pub use extract::{extract_text, FileKind};
pub use upload::{content_hash, validate_upload, Ingester, UploadMeta};
