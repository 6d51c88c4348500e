//! OCR task orchestration.
//!
//! One task row per invocation. Images go to the vision endpoint
//! directly; PDFs are walked page by page through their embedded page
//! images, and pages that fail are recorded individually rather than
//! failing the whole file. Confidence is a cheap text heuristic, not a
//! model-reported value.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::client::OcrClient;
use docbase_core::{Error, Result};
use docbase_store::{OcrTask, Store};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "tiff", "bmp"];

/// Outcome of recognizing one page or image.
struct PageResult {
    number: usize,
    text: Option<String>,
}

pub struct OcrService {
    store: Arc<Store>,
    client: Arc<dyn OcrClient>,
}

impl OcrService {
    pub fn new(store: Arc<Store>, client: Arc<dyn OcrClient>) -> Self {
        Self { store, client }
    }

    /// Run OCR over one file, recording the task lifecycle. The returned
    /// task reflects the final state: `completed` with text and a
    /// confidence score, or `failed` with an error message.
    pub async fn process_file(&self, user_id: i64, path: &Path) -> Result<OcrTask> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let task_id = self.store.create_ocr_task(
            user_id,
            &filename,
            &path.to_string_lossy(),
            &ext,
        )?;
        info!("OCR task {} started for {}", task_id, filename);

        let started = Instant::now();
        let outcome = if ext == "pdf" {
            self.recognize_pdf(path).await
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            self.recognize_image_file(path).await
        } else {
            Err(format!("Unsupported file type: .{}", ext))
        };
        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            Ok((text, confidence)) => {
                self.store.complete_ocr_task(
                    task_id,
                    &text,
                    confidence,
                    elapsed,
                    self.client.model(),
                )?;
                info!(
                    "OCR task {} completed in {:.2}s (confidence {:.2})",
                    task_id, elapsed, confidence
                );
            }
            Err(message) => {
                self.store.fail_ocr_task(task_id, &message)?;
                error!("OCR task {} failed: {}", task_id, message);
            }
        }

        self.store
            .get_ocr_task(task_id)?
            .ok_or_else(|| Error::Internal(format!("OCR task {} vanished", task_id)))
    }

    async fn recognize_image_file(&self, path: &Path) -> std::result::Result<(String, f64), String> {
        let bytes =
            std::fs::read(path).map_err(|e| format!("Could not read image file: {}", e))?;
        match self.client.recognize(&bytes).await {
            Some(text) if !text.is_empty() => {
                let confidence = estimate_confidence(&text);
                Ok((text, confidence))
            }
            Some(_) => Err("No text found in image".into()),
            None => Err("OCR call failed".into()),
        }
    }

    /// OCR a PDF via the page images embedded in it (scanned documents
    /// carry one full-page image per page). Pages without an image, or
    /// whose recognition fails, are marked unreadable; the file succeeds
    /// as long as at least one page reads.
    async fn recognize_pdf(&self, path: &Path) -> std::result::Result<(String, f64), String> {
        let doc = lopdf::Document::load(path)
            .map_err(|e| format!("Could not open PDF: {}", e))?;
        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err("PDF has no pages".into());
        }

        let mut results = Vec::with_capacity(pages.len());
        for (number, (_, page_id)) in pages.iter().enumerate() {
            let image_bytes: Option<Vec<u8>> = match doc.get_page_images(*page_id) {
                Ok(images) => images.first().map(|img| img.content.to_vec()),
                Err(e) => {
                    warn!("Could not read images of page {}: {}", number + 1, e);
                    None
                }
            };

            let text = match image_bytes {
                Some(bytes) => match self.client.recognize(&bytes).await {
                    Some(t) if !t.is_empty() => Some(t),
                    _ => None,
                },
                None => None,
            };
            results.push(PageResult {
                number: number + 1,
                text,
            });
        }

        let (text, confidence, successful) = aggregate_pages(&results);
        if successful == 0 {
            return Err("No readable pages in PDF".into());
        }
        Ok((text, confidence))
    }
}

/// Stitch per-page results into one document: page markers, unreadable
/// pages noted in place, confidence averaged over the pages that read.
fn aggregate_pages(pages: &[PageResult]) -> (String, f64, usize) {
    let mut sections = Vec::with_capacity(pages.len());
    let mut total_confidence = 0.0;
    let mut successful = 0usize;

    for page in pages {
        match &page.text {
            Some(text) => {
                sections.push(format!("--- Page {} ---\n{}", page.number, text));
                total_confidence += estimate_confidence(text);
                successful += 1;
            }
            None => {
                sections.push(format!("--- Page {} ---\n[no readable text]", page.number));
            }
        }
    }

    let confidence = total_confidence / successful.max(1) as f64;
    (sections.join("\n\n"), confidence, successful)
}

/// Rough confidence in an OCR result, judged from the text alone.
/// Starts at 0.5 and moves with length, the share of alphanumeric
/// characters, and whether any letters appear at all.
pub fn estimate_confidence(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }

    let mut score = 0.5;

    let char_count = text.chars().count();
    if char_count > 20 {
        score += 0.1;
    }

    let clean_chars = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .count();
    let clean_ratio = clean_chars as f64 / char_count as f64;
    score += (clean_ratio - 0.7) * 0.3;

    if text.chars().any(|c| c.is_alphabetic()) {
        score += 0.2;
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docbase_store::ProcessingStatus;

    struct StubOcr {
        reply: Option<String>,
    }

    #[async_trait]
    impl OcrClient for StubOcr {
        async fn recognize(&self, _image: &[u8]) -> Option<String> {
            self.reply.clone()
        }

        fn model(&self) -> &str {
            "stub-vision"
        }
    }

    fn service_with(reply: Option<&str>) -> (OcrService, Arc<Store>, i64) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let user = store.create_user("fred", "fred@example.com", "Fred").unwrap();
        let service = OcrService::new(
            store.clone(),
            Arc::new(StubOcr {
                reply: reply.map(|s| s.to_string()),
            }),
        );
        (service, store, user.id)
    }

    #[tokio::test]
    async fn image_recognition_completes_the_task() {
        let (service, _store, user_id) = service_with(Some("Invoice #42\nTotal: 100"));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, [0x89, 0x50, 0x4e, 0x47]).unwrap();

        let task = service.process_file(user_id, &path).await.unwrap();
        assert_eq!(task.status, ProcessingStatus::Completed);
        assert_eq!(task.extracted_text.as_deref(), Some("Invoice #42\nTotal: 100"));
        assert_eq!(task.model_used.as_deref(), Some("stub-vision"));
        assert!(task.confidence_score.unwrap() > 0.5);
        assert!(task.completed_at.is_some());
    }

    #[tokio::test]
    async fn remote_failure_fails_the_task() {
        let (service, _store, user_id) = service_with(None);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.jpg");
        std::fs::write(&path, [0xff, 0xd8]).unwrap();

        let task = service.process_file(user_id, &path).await.unwrap();
        assert_eq!(task.status, ProcessingStatus::Failed);
        assert_eq!(task.error_message.as_deref(), Some("OCR call failed"));
    }

    #[tokio::test]
    async fn unsupported_extension_fails_the_task() {
        let (service, _store, user_id) = service_with(Some("irrelevant"));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b,c").unwrap();

        let task = service.process_file(user_id, &path).await.unwrap();
        assert_eq!(task.status, ProcessingStatus::Failed);
        assert!(task.error_message.unwrap().contains(".csv"));
    }

    #[test]
    fn page_aggregation_averages_over_readable_pages() {
        let pages = vec![
            PageResult {
                number: 1,
                text: Some("A perfectly normal paragraph of scanned text.".into()),
            },
            PageResult {
                number: 2,
                text: None,
            },
            PageResult {
                number: 3,
                text: Some("Another readable page with plenty of words.".into()),
            },
        ];
        let (text, confidence, successful) = aggregate_pages(&pages);
        assert_eq!(successful, 2);
        assert!(text.contains("--- Page 1 ---"));
        assert!(text.contains("--- Page 2 ---\n[no readable text]"));
        assert!(text.contains("--- Page 3 ---"));
        assert!(confidence > 0.5);
    }

    #[test]
    fn confidence_heuristic_edges() {
        assert_eq!(estimate_confidence(""), 0.0);
        assert_eq!(estimate_confidence("   "), 0.0);

        let clean = estimate_confidence("A clear sentence of readable scanned text.");
        assert!(clean > 0.8);

        let noisy = estimate_confidence("@#$%^&*()_+|~=`{}[]");
        assert!(noisy < clean);

        // Never outside [0, 1].
        assert!(estimate_confidence(&"a".repeat(1000)) <= 1.0);
    }
}
