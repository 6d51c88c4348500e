//! Row types for documents, chunks, chat, OCR tasks, and statistics.

use serde::{Deserialize, Serialize};

/// Lifecycle of a document through extraction and embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A document row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub uuid: String,
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_type: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub is_processed: bool,
    pub processing_status: ProcessingStatus,
    #[serde(skip)]
    pub extracted_text: Option<String>,
    pub has_embeddings: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    pub chunks_count: i64,
    pub uploaded_by: i64,
    pub is_public: bool,
    pub access_count: i64,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<i64>,
}

impl Document {
    /// Display name: title when present, else the original filename.
    pub fn display_title(&self) -> &str {
        match &self.title {
            Some(t) if !t.is_empty() => t,
            _ => &self.original_filename,
        }
    }
}

/// Fields for inserting a new document after upload + extraction.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_type: String,
    pub mime_type: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub content_hash: Option<String>,
    pub extracted_text: Option<String>,
    pub uploaded_by: i64,
    pub is_public: bool,
}

/// A stored chunk row. `embedding_json` stays serialized until a
/// consumer actually needs the vector.
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    pub id: i64,
    pub document_id: i64,
    pub chunk_index: i64,
    pub content: String,
    pub embedding_json: Option<String>,
    pub embedding_model: Option<String>,
    pub page_number: Option<i64>,
    pub start_char: Option<i64>,
    pub end_char: Option<i64>,
    pub created_at: i64,
}

/// Fields for inserting a chunk during the embedding pipeline.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
    pub embedding_model: String,
    pub page_number: Option<i64>,
    pub start_char: Option<i64>,
    pub end_char: Option<i64>,
}

/// Join row for similarity search: an embedded chunk with its parent
/// document's display fields.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk_id: i64,
    pub document_id: i64,
    pub chunk_index: i64,
    pub content: String,
    pub embedding_json: String,
    pub filename: String,
    pub title: Option<String>,
    pub category: Option<String>,
}

/// A chat session row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: i64,
    pub uuid: String,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub is_active: bool,
    pub message_count: i64,
    pub total_tokens: i64,
    pub created_at: i64,
    pub last_activity: i64,
}

/// A chat message row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: i64,
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_documents: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_scores: Option<Vec<f64>>,
    pub created_at: i64,
}

/// Assistant-side fields recorded after a successful generation call.
#[derive(Debug, Clone)]
pub struct NewAssistantMessage {
    pub content: String,
    pub model_used: String,
    pub tokens_used: i64,
    pub response_time: f64,
    pub context_documents: Vec<i64>,
    pub similarity_scores: Vec<f64>,
}

/// Provenance row linking an assistant message to a context chunk.
#[derive(Debug, Clone)]
pub struct NewChatContext {
    pub document_id: i64,
    pub chunk_id: Option<i64>,
    pub similarity_score: f64,
    pub rank: i64,
}

/// A stored provenance row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatContext {
    pub id: i64,
    pub message_id: i64,
    pub document_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<i64>,
    pub similarity_score: f64,
    pub rank: i64,
}

/// An OCR task row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrTask {
    pub id: i64,
    pub uuid: String,
    pub user_id: i64,
    pub input_filename: String,
    pub input_file_path: String,
    pub input_file_type: String,
    pub status: ProcessingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

/// A user row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: i64,
}

/// One audit-log append.
#[derive(Debug, Clone, Default)]
pub struct AuditEntry {
    pub user_id: Option<i64>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub description: Option<String>,
    pub success: bool,
}

/// Document/embedding aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentStats {
    pub total_documents: i64,
    pub embedded_documents: i64,
    pub pending_documents: i64,
    pub failed_documents: i64,
    pub total_chunks: i64,
}

/// Chat aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct ChatStats {
    pub total_sessions: i64,
    pub active_sessions: i64,
    pub total_messages: i64,
    pub total_tokens: i64,
}

/// OCR aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct OcrStats {
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub failed_tasks: i64,
    pub avg_processing_time: f64,
    pub avg_confidence: f64,
}
