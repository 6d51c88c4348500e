//! Similarity search over stored chunk embeddings.
//!
//! The scan is exhaustive: every embedded chunk of every processed
//! document is scored against the query vector. That is fine at the
//! document counts this service targets; the `VectorIndex` seam exists
//! so an approximate index can replace the scan without changing any
//! caller when it stops being fine.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, warn};

use crate::embedder::Embedder;
use crate::similarity::cosine_similarity;
use docbase_store::{EmbeddedChunk, Store};

/// One ranked retrieval hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    pub chunk_id: i64,
    pub document_id: i64,
    pub chunk_index: i64,
    pub content: String,
    pub filename: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub similarity: f64,
}

/// Ranking seam: given a query vector and candidate rows, return the
/// top-k matches in descending similarity order.
pub trait VectorIndex: Send + Sync {
    fn top_k(&self, query: &[f32], candidates: Vec<EmbeddedChunk>, k: usize) -> Vec<SearchMatch>;
}

/// Linear scan with the exact cosine scoring the rest of the system
/// depends on (zero-norm vectors score 0.0).
pub struct BruteForceIndex;

impl VectorIndex for BruteForceIndex {
    fn top_k(&self, query: &[f32], candidates: Vec<EmbeddedChunk>, k: usize) -> Vec<SearchMatch> {
        let mut matches: Vec<SearchMatch> = candidates
            .into_iter()
            .filter_map(|row| {
                let vector: Vec<f32> = match serde_json::from_str(&row.embedding_json) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("Skipping chunk {} with unreadable embedding: {}", row.chunk_id, e);
                        return None;
                    }
                };
                let similarity = cosine_similarity(query, &vector);
                let title = match &row.title {
                    Some(t) if !t.is_empty() => t.clone(),
                    _ => row.filename.clone(),
                };
                Some(SearchMatch {
                    chunk_id: row.chunk_id,
                    document_id: row.document_id,
                    chunk_index: row.chunk_index,
                    content: row.content,
                    filename: row.filename,
                    title,
                    category: row.category,
                    similarity,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(k);
        matches
    }
}

/// Query-time retrieval: embed the query, scan the candidate set, rank.
pub struct SearchService {
    store: Arc<Store>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl SearchService {
    pub fn new(store: Arc<Store>, embedder: Arc<dyn Embedder>) -> Self {
        Self::with_index(store, embedder, Arc::new(BruteForceIndex))
    }

    pub fn with_index(
        store: Arc<Store>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            store,
            embedder,
            index,
        }
    }

    /// Find the `top_k` most similar chunks for a query, optionally
    /// restricted to a set of document ids. Failure to embed the query,
    /// or any storage problem, yields an empty result list, never an
    /// error.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        document_ids: Option<&[i64]>,
    ) -> Vec<SearchMatch> {
        let Some(query_vector) = self.embedder.embed(query).await else {
            error!("Could not embed search query");
            return Vec::new();
        };

        let candidates = match self
            .store
            .embedded_chunks(self.embedder.model(), document_ids)
        {
            Ok(rows) => rows,
            Err(e) => {
                error!("Could not load candidate chunks: {}", e);
                return Vec::new();
            }
        };

        self.index.top_k(&query_vector, candidates, top_k)
    }
}
