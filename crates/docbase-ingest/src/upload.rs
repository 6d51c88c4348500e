//! Upload pipeline: validate → save file → extract text → document row.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::extract::{self, FileKind};
use docbase_core::{Error, Result};
use docbase_store::{Document, NewDocument, Store};

const SUPPORTED_EXTENSIONS: [&str; 10] = [
    "pdf", "docx", "xlsx", "pptx", "txt", "jpg", "jpeg", "png", "tiff", "bmp",
];

const MAX_FILENAME_LEN: usize = 255;

/// Caller-supplied metadata for an upload.
#[derive(Debug, Clone, Default)]
pub struct UploadMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: bool,
}

/// Reject unsupported or oversized uploads before anything touches disk.
pub fn validate_upload(original_filename: &str, size_bytes: u64, max_upload_mb: u64) -> Result<()> {
    if original_filename.chars().count() > MAX_FILENAME_LEN {
        return Err(Error::Validation("Filename too long".into()));
    }
    let ext = file_extension(original_filename);
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(Error::Validation(format!(
            "Unsupported file type: .{}",
            ext
        )));
    }
    let max_bytes = max_upload_mb * 1024 * 1024;
    if size_bytes > max_bytes {
        return Err(Error::Validation(format!(
            "File too large: {:.1}MB exceeds the {}MB limit",
            size_bytes as f64 / 1024.0 / 1024.0,
            max_upload_mb
        )));
    }
    Ok(())
}

/// Saves uploads under a generated name and records the document row.
pub struct Ingester<'a> {
    store: &'a Store,
    uploads_dir: &'a Path,
    max_upload_mb: u64,
}

impl<'a> Ingester<'a> {
    pub fn new(store: &'a Store, uploads_dir: &'a Path, max_upload_mb: u64) -> Self {
        Self {
            store,
            uploads_dir,
            max_upload_mb,
        }
    }

    /// Run the full upload pipeline for one file.
    ///
    /// Image uploads are stored with no extracted text and stay `pending`
    /// until OCR fills them in; text-bearing formats come out `completed`
    /// and ready for the embedding pass.
    pub fn ingest_upload(
        &self,
        user_id: i64,
        original_filename: &str,
        bytes: &[u8],
        meta: UploadMeta,
    ) -> Result<Document> {
        validate_upload(original_filename, bytes.len() as u64, self.max_upload_mb)?;

        let ext = file_extension(original_filename);
        let stored_filename = format!("{}.{}", Uuid::new_v4(), ext);
        let file_path = self.uploads_dir.join(&stored_filename);
        std::fs::write(&file_path, bytes)?;

        let content_hash = content_hash(bytes);
        let mime_type = mime_guess::from_path(original_filename)
            .first_or_octet_stream()
            .to_string();

        let kind = FileKind::from_extension(&ext);
        let extracted_text = if kind.is_image() {
            None
        } else {
            match extract::extract_text(&file_path) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Extraction failed for {}: {}", original_filename, e);
                    None
                }
            }
        };

        let doc = NewDocument {
            filename: stored_filename,
            original_filename: original_filename.to_string(),
            file_path: file_path.to_string_lossy().into_owned(),
            file_size: bytes.len() as i64,
            file_type: ext,
            mime_type,
            title: meta.title,
            description: meta.description,
            category: meta.category,
            tags: meta.tags,
            content_hash: Some(content_hash),
            extracted_text,
            uploaded_by: user_id,
            is_public: meta.is_public,
        };

        let doc_id = match self.store.insert_document(&doc) {
            Ok(id) => id,
            Err(e) => {
                // Orphaned file cleanup mirrors the failed insert.
                let _ = std::fs::remove_file(&file_path);
                return Err(e);
            }
        };

        info!(
            "Stored upload {} as document {} ({} bytes)",
            original_filename, doc_id, bytes.len()
        );

        self.store
            .get_document(doc_id)?
            .ok_or_else(|| Error::Internal(format!("Document {} vanished after insert", doc_id)))
    }

    /// Remove a document row and its stored file.
    pub fn remove_document(&self, doc_id: i64) -> Result<bool> {
        let Some(doc) = self.store.get_document(doc_id)? else {
            return Ok(false);
        };
        let deleted = self.store.delete_document(doc_id)?;
        if deleted {
            let path = PathBuf::from(&doc.file_path);
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Could not remove stored file {}: {}", path.display(), e);
            }
        }
        Ok(deleted)
    }
}

fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// SHA-256 of the uploaded bytes, for duplicate detection.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbase_store::ProcessingStatus;

    #[test]
    fn validation_rejects_unsupported_and_oversized() {
        assert!(validate_upload("report.pdf", 1024, 200).is_ok());
        assert!(matches!(
            validate_upload("tool.exe", 1024, 200),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            validate_upload("big.pdf", 300 * 1024 * 1024, 200),
            Err(Error::Validation(_))
        ));
        let long_name = format!("{}.txt", "a".repeat(300));
        assert!(matches!(
            validate_upload(&long_name, 10, 200),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn text_upload_is_extracted_and_completed() {
        let store = Store::open_in_memory().unwrap();
        let user = store.create_user("bob", "bob@example.com", "Bob").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let ingester = Ingester::new(&store, dir.path(), 200);

        let doc = ingester
            .ingest_upload(user.id, "notes.txt", b"meeting notes here", UploadMeta::default())
            .unwrap();

        assert_eq!(doc.processing_status, ProcessingStatus::Completed);
        assert!(doc.is_processed);
        assert_eq!(doc.file_type, "txt");
        assert_eq!(doc.original_filename, "notes.txt");
        assert!(doc.filename.ends_with(".txt"));
        assert!(std::path::Path::new(&doc.file_path).exists());

        let stored = store.get_document(doc.id).unwrap().unwrap();
        assert_eq!(stored.extracted_text.as_deref(), Some("meeting notes here"));
    }

    #[test]
    fn image_upload_stays_pending() {
        let store = Store::open_in_memory().unwrap();
        let user = store.create_user("bob", "bob@example.com", "Bob").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let ingester = Ingester::new(&store, dir.path(), 200);

        let doc = ingester
            .ingest_upload(user.id, "scan.png", &[0x89, 0x50], UploadMeta::default())
            .unwrap();
        assert_eq!(doc.processing_status, ProcessingStatus::Pending);
        assert!(!doc.is_processed);
    }

    #[test]
    fn remove_document_deletes_file_and_row() {
        let store = Store::open_in_memory().unwrap();
        let user = store.create_user("bob", "bob@example.com", "Bob").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let ingester = Ingester::new(&store, dir.path(), 200);

        let doc = ingester
            .ingest_upload(user.id, "notes.txt", b"text", UploadMeta::default())
            .unwrap();
        let path = doc.file_path.clone();

        assert!(ingester.remove_document(doc.id).unwrap());
        assert!(store.get_document(doc.id).unwrap().is_none());
        assert!(!std::path::Path::new(&path).exists());
        assert!(!ingester.remove_document(doc.id).unwrap());
    }
}
