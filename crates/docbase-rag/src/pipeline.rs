//! Per-document embedding pipeline: chunk the extracted text, embed each
//! chunk sequentially, persist the results, and track status on the
//! document row.
//!
//! Re-running the pipeline for a document first clears its existing
//! chunks, so a partial earlier run never leaves duplicates behind; the
//! unique (document_id, chunk_index) constraint backstops concurrent
//! runs.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::embedder::{Embedder, ProgressFn};
use docbase_core::{EmbeddingConfig, Error, Result};
use docbase_store::{NewChunk, ProcessingStatus, Store};

/// Summary of one embedding pass.
#[derive(Debug, Clone)]
pub struct EmbedOutcome {
    pub chunks_total: usize,
    pub chunks_embedded: usize,
    pub status: ProcessingStatus,
}

/// Run the embedding pipeline for one document.
///
/// Fails up front (status untouched) when the document is missing or has
/// no extracted text; any later failure flips the document to `failed`.
/// Individual chunks whose embedding call fails are skipped; the pass
/// completes as long as at least one chunk embeds.
pub async fn process_document(
    store: &Store,
    embedder: &dyn Embedder,
    cfg: &EmbeddingConfig,
    doc_id: i64,
    progress: Option<ProgressFn<'_>>,
) -> Result<EmbedOutcome> {
    let document = store
        .get_document(doc_id)?
        .ok_or_else(|| Error::NotFound(format!("Document {}", doc_id)))?;

    let text = match &document.extracted_text {
        Some(t) if !t.trim().is_empty() => t.clone(),
        _ => {
            return Err(Error::Validation(format!(
                "Document {} has no extracted text",
                doc_id
            )))
        }
    };

    store.set_processing_status(doc_id, ProcessingStatus::Processing)?;

    match run_pass(store, embedder, cfg, doc_id, &text, progress).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            error!("Embedding pass for document {} failed: {}", doc_id, e);
            if let Err(status_err) = store.set_processing_status(doc_id, ProcessingStatus::Failed) {
                error!(
                    "Could not mark document {} as failed: {}",
                    doc_id, status_err
                );
            }
            Err(e)
        }
    }
}

async fn run_pass(
    store: &Store,
    embedder: &dyn Embedder,
    cfg: &EmbeddingConfig,
    doc_id: i64,
    text: &str,
    progress: Option<ProgressFn<'_>>,
) -> Result<EmbedOutcome> {
    // Idempotent re-run: clear whatever an earlier pass left behind.
    let removed = store.delete_chunks_for_document(doc_id)?;
    if removed > 0 {
        info!("Cleared {} stale chunks for document {}", removed, doc_id);
    }

    let spans = docbase_ingest::chunk_spans(text, cfg.chunk_size, cfg.chunk_overlap);
    let total = spans.len();
    info!("Document {} split into {} chunks", doc_id, total);

    let delay = Duration::from_millis(cfg.batch_delay_ms);
    let mut embedded = 0usize;

    for (i, span) in spans.iter().enumerate() {
        match embedder.embed(&span.text).await {
            Some(vector) => {
                let chunk = NewChunk {
                    chunk_index: i as i64,
                    content: span.text.clone(),
                    embedding: vector,
                    embedding_model: embedder.model().to_string(),
                    page_number: None,
                    start_char: Some(span.start_char as i64),
                    end_char: Some(span.end_char as i64),
                };
                match store.insert_chunk(doc_id, &chunk) {
                    Ok(_) => embedded += 1,
                    Err(e) => warn!("Could not store chunk {} of document {}: {}", i, doc_id, e),
                }
            }
            None => warn!("No embedding for chunk {} of document {}", i, doc_id),
        }

        if let Some(report) = progress {
            report(i + 1, total);
        }
        if i + 1 < total && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    let status = if embedded > 0 {
        ProcessingStatus::Completed
    } else {
        ProcessingStatus::Failed
    };
    store.finish_embedding_pass(doc_id, embedded as i64, embedder.model(), status)?;

    info!(
        "Document {} embedding pass done: {}/{} chunks",
        doc_id, embedded, total
    );

    Ok(EmbedOutcome {
        chunks_total: total,
        chunks_embedded: embedded,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docbase_store::NewDocument;

    struct FixedEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, text: &str) -> Option<Vec<f32>> {
            if self.fail {
                None
            } else {
                Some(vec![text.len() as f32, 1.0])
            }
        }

        fn model(&self) -> &str {
            "stub-model"
        }
    }

    fn store_with_document(text: Option<&str>) -> (Store, i64) {
        let store = Store::open_in_memory().unwrap();
        let user = store.create_user("dave", "dave@example.com", "Dave").unwrap();
        let doc_id = store
            .insert_document(&NewDocument {
                filename: "doc.txt".into(),
                original_filename: "doc.txt".into(),
                file_path: "/tmp/doc.txt".into(),
                file_size: 0,
                file_type: "txt".into(),
                mime_type: "text/plain".into(),
                extracted_text: text.map(|t| t.to_string()),
                uploaded_by: user.id,
                ..Default::default()
            })
            .unwrap();
        (store, doc_id)
    }

    fn test_cfg() -> EmbeddingConfig {
        EmbeddingConfig {
            chunk_size: 20,
            chunk_overlap: 5,
            batch_delay_ms: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn pass_embeds_chunks_and_completes_document() {
        let (store, doc_id) =
            store_with_document(Some("First sentence here. Second sentence too. And a third."));
        let embedder = FixedEmbedder { fail: false };

        let outcome = process_document(&store, &embedder, &test_cfg(), doc_id, None)
            .await
            .unwrap();
        assert!(outcome.chunks_total >= 2);
        assert_eq!(outcome.chunks_embedded, outcome.chunks_total);
        assert_eq!(outcome.status, ProcessingStatus::Completed);

        let doc = store.get_document(doc_id).unwrap().unwrap();
        assert!(doc.has_embeddings);
        assert_eq!(doc.chunks_count, outcome.chunks_embedded as i64);
        assert_eq!(doc.embedding_model.as_deref(), Some("stub-model"));
        assert!(doc.processed_at.is_some());

        let chunks = store.chunks_for_document(doc_id).unwrap();
        assert_eq!(chunks.len(), outcome.chunks_embedded);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[tokio::test]
    async fn rerun_replaces_chunks_without_duplicates() {
        let (store, doc_id) =
            store_with_document(Some("First sentence here. Second sentence too. And a third."));
        let embedder = FixedEmbedder { fail: false };
        let cfg = test_cfg();

        let first = process_document(&store, &embedder, &cfg, doc_id, None)
            .await
            .unwrap();
        let second = process_document(&store, &embedder, &cfg, doc_id, None)
            .await
            .unwrap();

        assert_eq!(first.chunks_embedded, second.chunks_embedded);
        let chunks = store.chunks_for_document(doc_id).unwrap();
        assert_eq!(chunks.len(), second.chunks_embedded);
    }

    #[tokio::test]
    async fn all_embeddings_failing_marks_document_failed() {
        let (store, doc_id) = store_with_document(Some("Some text that will not embed."));
        let embedder = FixedEmbedder { fail: true };

        let outcome = process_document(&store, &embedder, &test_cfg(), doc_id, None)
            .await
            .unwrap();
        assert_eq!(outcome.chunks_embedded, 0);
        assert_eq!(outcome.status, ProcessingStatus::Failed);

        let doc = store.get_document(doc_id).unwrap().unwrap();
        assert!(!doc.has_embeddings);
        assert_eq!(doc.processing_status, ProcessingStatus::Failed);
    }

    #[tokio::test]
    async fn missing_text_is_rejected_before_any_status_change() {
        let (store, doc_id) = store_with_document(None);
        let embedder = FixedEmbedder { fail: false };

        let result = process_document(&store, &embedder, &test_cfg(), doc_id, None).await;
        assert!(matches!(result, Err(Error::Validation(_))));

        let doc = store.get_document(doc_id).unwrap().unwrap();
        assert_eq!(doc.processing_status, ProcessingStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let (store, _) = store_with_document(Some("text"));
        let embedder = FixedEmbedder { fail: false };
        let result = process_document(&store, &embedder, &test_cfg(), 9999, None).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn progress_is_reported_per_chunk() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let (store, doc_id) =
            store_with_document(Some("First sentence here. Second sentence too. And a third."));
        let embedder = FixedEmbedder { fail: false };
        let calls = AtomicUsize::new(0);
        let progress = |_done: usize, _total: usize| {
            calls.fetch_add(1, Ordering::SeqCst);
        };

        let outcome = process_document(&store, &embedder, &test_cfg(), doc_id, Some(&progress))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), outcome.chunks_total);
    }
}
