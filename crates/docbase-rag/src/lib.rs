//! docbase-rag: embedding generation, similarity search, and the
//! per-document embedding pipeline.

pub mod embedder;
pub mod pipeline;
pub mod search;
pub mod similarity;

pub use embedder::{Embedder, ProgressFn, RemoteEmbedder};
pub use pipeline::{process_document, EmbedOutcome};
pub use search::{BruteForceIndex, SearchMatch, SearchService, VectorIndex};
pub use similarity::cosine_similarity;
