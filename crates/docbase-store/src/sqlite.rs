//! SQLite-backed relational store.
//!
//! Single connection behind a mutex, WAL mode, foreign keys on. Every
//! public method takes the lock for the duration of one logical
//! operation; the chat turn and the embedding pass use explicit
//! transactions so their writes commit or roll back as a unit.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

use crate::schema::SCHEMA_SQL;
use crate::types::*;
use docbase_core::{now_millis, Error, Result};

pub struct Store {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Store {
    /// Open or create the store. `db_dir` is the directory; the file is
    /// `db_dir/docbase.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("docbase.db");

        let conn = Connection::open(&db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: db_path.clone(),
        };

        let stats = store.document_stats()?;
        info!(
            "Store initialized: {} documents, {} chunks, path={}",
            stats.total_documents,
            stats.total_chunks,
            db_path.display()
        );

        Ok(store)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
        conn.execute_batch(SCHEMA_SQL).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ---------------------------------------------------------------
    // Users
    // ---------------------------------------------------------------

    pub fn create_user(&self, username: &str, email: &str, full_name: &str) -> Result<User> {
        let conn = self.conn.lock();
        let id = conn
            .prepare_cached(
                "INSERT INTO users (username, email, full_name, created_at) VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(db_err)?
            .insert(params![username, email, full_name, now_millis()])
            .map_err(db_err)?;
        let user = conn
            .prepare_cached("SELECT * FROM users WHERE id = ?1")
            .map_err(db_err)?
            .query_row(params![id], row_to_user)
            .map_err(db_err);
        user
    }

    pub fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .prepare_cached("SELECT * FROM users WHERE id = ?1")
            .map_err(db_err)?
            .query_row(params![user_id], row_to_user)
            .optional()
            .map_err(db_err);
        user
    }

    // ---------------------------------------------------------------
    // Documents
    // ---------------------------------------------------------------

    /// Insert a document row. Returns the new document ID.
    pub fn insert_document(&self, doc: &NewDocument) -> Result<i64> {
        let now = now_millis();
        let tags_json = match &doc.tags {
            Some(tags) => Some(serde_json::to_string(tags)?),
            None => None,
        };
        // A document whose text extraction succeeded is immediately usable
        // for the embedding pass; image uploads stay pending until OCR.
        let (status, processed) = if doc.extracted_text.is_some() {
            (ProcessingStatus::Completed, true)
        } else {
            (ProcessingStatus::Pending, false)
        };

        let conn = self.conn.lock();
        let id = conn
            .prepare_cached(
                "INSERT INTO documents (
                    uuid, filename, original_filename, file_path, file_size,
                    file_type, mime_type, title, description, category,
                    tags_json, content_hash, is_processed, processing_status,
                    extracted_text, uploaded_by, is_public, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            )
            .map_err(db_err)?
            .insert(params![
                Uuid::new_v4().to_string(),
                doc.filename,
                doc.original_filename,
                doc.file_path,
                doc.file_size,
                doc.file_type,
                doc.mime_type,
                doc.title,
                doc.description,
                doc.category,
                tags_json,
                doc.content_hash,
                processed,
                status.as_str(),
                doc.extracted_text,
                doc.uploaded_by,
                doc.is_public,
                now,
            ])
            .map_err(db_err)?;
        Ok(id)
    }

    pub fn get_document(&self, doc_id: i64) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        let doc = conn
            .prepare_cached("SELECT * FROM documents WHERE id = ?1")
            .map_err(db_err)?
            .query_row(params![doc_id], row_to_document)
            .optional()
            .map_err(db_err);
        doc
    }

    pub fn find_document_by_hash(&self, content_hash: &str) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        let doc = conn
            .prepare_cached("SELECT * FROM documents WHERE content_hash = ?1")
            .map_err(db_err)?
            .query_row(params![content_hash], row_to_document)
            .optional()
            .map_err(db_err);
        doc
    }

    /// List documents, newest first.
    pub fn list_documents(&self, limit: usize) -> Result<Vec<Document>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM documents ORDER BY created_at DESC LIMIT ?1")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_document)
            .map_err(db_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Delete a document; its chunks go with it (cascade).
    pub fn delete_document(&self, doc_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM documents WHERE id = ?1", params![doc_id])
            .map_err(db_err)?;
        Ok(count > 0)
    }

    pub fn set_processing_status(&self, doc_id: i64, status: ProcessingStatus) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE documents SET processing_status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), now_millis(), doc_id],
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    /// Final bookkeeping for one embedding pass over a document.
    pub fn finish_embedding_pass(
        &self,
        doc_id: i64,
        chunks_count: i64,
        embedding_model: &str,
        status: ProcessingStatus,
    ) -> Result<bool> {
        let now = now_millis();
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE documents SET
                    has_embeddings = ?1, chunks_count = ?2, embedding_model = ?3,
                    processing_status = ?4, processed_at = ?5, updated_at = ?5
                 WHERE id = ?6",
                params![
                    chunks_count > 0,
                    chunks_count,
                    embedding_model,
                    status.as_str(),
                    now,
                    doc_id
                ],
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    pub fn increment_access(&self, doc_id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE documents SET access_count = access_count + 1 WHERE id = ?1",
            params![doc_id],
        )
        .map_err(db_err)?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Chunks
    // ---------------------------------------------------------------

    /// Remove all chunks of a document. The embedding pipeline calls this
    /// before re-inserting so a re-run never duplicates rows.
    pub fn delete_chunks_for_document(&self, doc_id: i64) -> Result<usize> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM document_chunks WHERE document_id = ?1",
            params![doc_id],
        )
        .map_err(db_err)
    }

    pub fn insert_chunk(&self, doc_id: i64, chunk: &NewChunk) -> Result<i64> {
        let embedding_json = serde_json::to_string(&chunk.embedding)?;
        let conn = self.conn.lock();
        let chunk_id = conn
            .prepare_cached(
                "INSERT INTO document_chunks (
                document_id, chunk_index, content, embedding_json,
                embedding_model, page_number, start_char, end_char, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .map_err(db_err)?
            .insert(params![
                doc_id,
                chunk.chunk_index,
                chunk.content,
                embedding_json,
                chunk.embedding_model,
                chunk.page_number,
                chunk.start_char,
                chunk.end_char,
                now_millis(),
            ])
            .map_err(db_err);
        chunk_id
    }

    pub fn chunks_for_document(&self, doc_id: i64) -> Result<Vec<DocumentChunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT * FROM document_chunks WHERE document_id = ?1 ORDER BY chunk_index",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![doc_id], row_to_chunk)
            .map_err(db_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// All embedded chunks of processed documents, restricted to the given
    /// embedding model and (optionally) a document-id subset. This is the
    /// candidate set for the brute-force similarity scan.
    pub fn embedded_chunks(
        &self,
        embedding_model: &str,
        document_ids: Option<&[i64]>,
    ) -> Result<Vec<EmbeddedChunk>> {
        let mut sql = String::from(
            "SELECT
                dc.id AS chunk_id, dc.document_id, dc.chunk_index, dc.content,
                dc.embedding_json, d.original_filename AS filename, d.title, d.category
             FROM document_chunks dc
             JOIN documents d ON dc.document_id = d.id
             WHERE dc.embedding_json IS NOT NULL
               AND dc.embedding_model = ?1
               AND d.is_processed = 1",
        );
        let mut bound: Vec<rusqlite::types::Value> =
            vec![rusqlite::types::Value::from(embedding_model.to_string())];

        if let Some(ids) = document_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; ids.len()].join(",");
            sql.push_str(&format!(" AND d.id IN ({})", placeholders));
            bound.extend(ids.iter().map(|id| rusqlite::types::Value::from(*id)));
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(bound), row_to_embedded_chunk)
            .map_err(db_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ---------------------------------------------------------------
    // Chat sessions
    // ---------------------------------------------------------------

    pub fn create_session(
        &self,
        user_id: i64,
        title: Option<&str>,
        system_prompt: Option<&str>,
    ) -> Result<ChatSession> {
        let now = now_millis();
        let conn = self.conn.lock();
        let id = conn
            .prepare_cached(
                "INSERT INTO chat_sessions (uuid, user_id, title, system_prompt, created_at, last_activity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            )
            .map_err(db_err)?
            .insert(params![
                Uuid::new_v4().to_string(),
                user_id,
                title,
                system_prompt,
                now
            ])
            .map_err(db_err)?;
        let session = conn
            .prepare_cached("SELECT * FROM chat_sessions WHERE id = ?1")
            .map_err(db_err)?
            .query_row(params![id], row_to_session)
            .map_err(db_err);
        session
    }

    pub fn get_session(&self, session_id: i64) -> Result<Option<ChatSession>> {
        let conn = self.conn.lock();
        let session = conn
            .prepare_cached("SELECT * FROM chat_sessions WHERE id = ?1")
            .map_err(db_err)?
            .query_row(params![session_id], row_to_session)
            .optional()
            .map_err(db_err);
        session
    }

    /// Active sessions of one user, most recently used first.
    pub fn sessions_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<ChatSession>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT * FROM chat_sessions WHERE user_id = ?1 AND is_active = 1
                 ORDER BY last_activity DESC LIMIT ?2",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], row_to_session)
            .map_err(db_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Soft delete: flips `is_active` off, history stays queryable.
    pub fn soft_delete_session(&self, session_id: i64, user_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE chat_sessions SET is_active = 0, updated_at = ?1
                 WHERE id = ?2 AND user_id = ?3",
                params![now_millis(), session_id, user_id],
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    pub fn rename_session(&self, session_id: i64, user_id: i64, title: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE chat_sessions SET title = ?1, updated_at = ?2
                 WHERE id = ?3 AND user_id = ?4",
                params![title, now_millis(), session_id, user_id],
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    // ---------------------------------------------------------------
    // Chat messages
    // ---------------------------------------------------------------

    /// Persist the user's side of a turn. Committed before retrieval
    /// starts, so a failed turn still keeps the question.
    pub fn insert_user_message(&self, session_id: i64, content: &str) -> Result<i64> {
        let conn = self.conn.lock();
        let message_id = conn
            .prepare_cached(
                "INSERT INTO chat_messages (session_id, role, content, created_at)
             VALUES (?1, 'user', ?2, ?3)",
            )
            .map_err(db_err)?
            .insert(params![session_id, content, now_millis()])
            .map_err(db_err);
        message_id
    }

    /// Persist the assistant message, its provenance rows, and the session
    /// counter updates in one transaction. Returns the message ID.
    pub fn record_assistant_turn(
        &self,
        session_id: i64,
        message: &NewAssistantMessage,
        contexts: &[NewChatContext],
    ) -> Result<i64> {
        let now = now_millis();
        let context_docs_json = if message.context_documents.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&message.context_documents)?)
        };
        let scores_json = if message.similarity_scores.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&message.similarity_scores)?)
        };

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;

        let message_id = tx
            .prepare_cached(
                "INSERT INTO chat_messages (
                    session_id, role, content, model_used, tokens_used,
                    response_time, context_documents_json, similarity_scores_json, created_at
                ) VALUES (?1, 'assistant', ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .map_err(db_err)?
            .insert(params![
                session_id,
                message.content,
                message.model_used,
                message.tokens_used,
                message.response_time,
                context_docs_json,
                scores_json,
                now,
            ])
            .map_err(db_err)?;

        for ctx in contexts {
            tx.prepare_cached(
                "INSERT INTO chat_contexts (
                    message_id, document_id, chunk_id, similarity_score, rank, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .map_err(db_err)?
            .execute(params![
                message_id,
                ctx.document_id,
                ctx.chunk_id,
                ctx.similarity_score,
                ctx.rank,
                now,
            ])
            .map_err(db_err)?;
        }

        // user + assistant message for this turn
        tx.execute(
            "UPDATE chat_sessions SET
                message_count = message_count + 2,
                total_tokens = total_tokens + ?1,
                last_activity = ?2, updated_at = ?2
             WHERE id = ?3",
            params![message.tokens_used, now, session_id],
        )
        .map_err(db_err)?;

        tx.commit().map_err(db_err)?;
        Ok(message_id)
    }

    /// Chat history in chronological order (most recent `limit` messages).
    pub fn messages_for_session(&self, session_id: i64, limit: usize) -> Result<Vec<ChatMessage>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT * FROM chat_messages WHERE session_id = ?1
                 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![session_id, limit as i64], row_to_message)
            .map_err(db_err)?;
        let mut messages: Vec<ChatMessage> = rows.filter_map(|r| r.ok()).collect();
        messages.reverse();
        Ok(messages)
    }

    pub fn contexts_for_message(&self, message_id: i64) -> Result<Vec<ChatContext>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT * FROM chat_contexts WHERE message_id = ?1 ORDER BY rank",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![message_id], row_to_context)
            .map_err(db_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ---------------------------------------------------------------
    // OCR tasks
    // ---------------------------------------------------------------

    pub fn create_ocr_task(
        &self,
        user_id: i64,
        input_filename: &str,
        input_file_path: &str,
        input_file_type: &str,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        let task_id = conn
            .prepare_cached(
                "INSERT INTO ocr_tasks (
                uuid, user_id, input_filename, input_file_path, input_file_type,
                status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 'processing', ?6)",
            )
            .map_err(db_err)?
            .insert(params![
                Uuid::new_v4().to_string(),
                user_id,
                input_filename,
                input_file_path,
                input_file_type,
                now_millis(),
            ])
            .map_err(db_err);
        task_id
    }

    pub fn complete_ocr_task(
        &self,
        task_id: i64,
        extracted_text: &str,
        confidence_score: f64,
        processing_time: f64,
        model_used: &str,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE ocr_tasks SET
                    status = 'completed', extracted_text = ?1, confidence_score = ?2,
                    processing_time = ?3, model_used = ?4, completed_at = ?5
                 WHERE id = ?6",
                params![
                    extracted_text,
                    confidence_score,
                    processing_time,
                    model_used,
                    now_millis(),
                    task_id
                ],
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    pub fn fail_ocr_task(&self, task_id: i64, error_message: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "UPDATE ocr_tasks SET status = 'failed', error_message = ?1, completed_at = ?2
                 WHERE id = ?3",
                params![error_message, now_millis(), task_id],
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    pub fn get_ocr_task(&self, task_id: i64) -> Result<Option<OcrTask>> {
        let conn = self.conn.lock();
        let task = conn
            .prepare_cached("SELECT * FROM ocr_tasks WHERE id = ?1")
            .map_err(db_err)?
            .query_row(params![task_id], row_to_ocr_task)
            .optional()
            .map_err(db_err);
        task
    }

    pub fn ocr_tasks_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<OcrTask>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT * FROM ocr_tasks WHERE user_id = ?1
                 ORDER BY created_at DESC LIMIT ?2",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], row_to_ocr_task)
            .map_err(db_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ---------------------------------------------------------------
    // System configs & audit log
    // ---------------------------------------------------------------

    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .prepare_cached("SELECT value FROM system_configs WHERE key = ?1")
            .map_err(db_err)?
            .query_row(params![key], |row| row.get(0))
            .optional()
            .map_err(db_err);
        value
    }

    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO system_configs (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now_millis()],
        )
        .map_err(db_err)?;
        Ok(())
    }

    pub fn record_audit(&self, entry: &AuditEntry) -> Result<()> {
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO audit_logs (
                user_id, action, resource_type, resource_id, description, success, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .map_err(db_err)?
        .execute(params![
            entry.user_id,
            entry.action,
            entry.resource_type,
            entry.resource_id,
            entry.description,
            entry.success,
            now_millis(),
        ])
        .map_err(db_err)?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Statistics
    // ---------------------------------------------------------------

    pub fn document_stats(&self) -> Result<DocumentStats> {
        let conn = self.conn.lock();
        let count = |sql: &str| -> Result<i64> {
            conn.query_row(sql, [], |row| row.get(0)).map_err(db_err)
        };
        Ok(DocumentStats {
            total_documents: count("SELECT COUNT(*) FROM documents")?,
            embedded_documents: count(
                "SELECT COUNT(*) FROM documents WHERE has_embeddings = 1",
            )?,
            pending_documents: count(
                "SELECT COUNT(*) FROM documents WHERE processing_status = 'pending'",
            )?,
            failed_documents: count(
                "SELECT COUNT(*) FROM documents WHERE processing_status = 'failed'",
            )?,
            total_chunks: count("SELECT COUNT(*) FROM document_chunks")?,
        })
    }

    pub fn chat_stats(&self, user_id: Option<i64>) -> Result<ChatStats> {
        let conn = self.conn.lock();
        let scoped = |sql_all: &str, sql_user: &str| -> Result<i64> {
            match user_id {
                Some(uid) => conn
                    .query_row(sql_user, params![uid], |row| row.get(0))
                    .map_err(db_err),
                None => conn.query_row(sql_all, [], |row| row.get(0)).map_err(db_err),
            }
        };
        Ok(ChatStats {
            total_sessions: scoped(
                "SELECT COUNT(*) FROM chat_sessions",
                "SELECT COUNT(*) FROM chat_sessions WHERE user_id = ?1",
            )?,
            active_sessions: scoped(
                "SELECT COUNT(*) FROM chat_sessions WHERE is_active = 1",
                "SELECT COUNT(*) FROM chat_sessions WHERE is_active = 1 AND user_id = ?1",
            )?,
            total_messages: scoped(
                "SELECT COUNT(*) FROM chat_messages",
                "SELECT COUNT(*) FROM chat_messages m
                 JOIN chat_sessions s ON m.session_id = s.id WHERE s.user_id = ?1",
            )?,
            total_tokens: scoped(
                "SELECT COALESCE(SUM(total_tokens), 0) FROM chat_sessions",
                "SELECT COALESCE(SUM(total_tokens), 0) FROM chat_sessions WHERE user_id = ?1",
            )?,
        })
    }

    pub fn ocr_stats(&self, user_id: Option<i64>) -> Result<OcrStats> {
        let conn = self.conn.lock();
        let scoped_count = |status: &str| -> Result<i64> {
            match user_id {
                Some(uid) => conn
                    .query_row(
                        "SELECT COUNT(*) FROM ocr_tasks WHERE status = ?1 AND user_id = ?2",
                        params![status, uid],
                        |row| row.get(0),
                    )
                    .map_err(db_err),
                None => conn
                    .query_row(
                        "SELECT COUNT(*) FROM ocr_tasks WHERE status = ?1",
                        params![status],
                        |row| row.get(0),
                    )
                    .map_err(db_err),
            }
        };
        let total: i64 = match user_id {
            Some(uid) => conn
                .query_row(
                    "SELECT COUNT(*) FROM ocr_tasks WHERE user_id = ?1",
                    params![uid],
                    |row| row.get(0),
                )
                .map_err(db_err)?,
            None => conn
                .query_row("SELECT COUNT(*) FROM ocr_tasks", [], |row| row.get(0))
                .map_err(db_err)?,
        };
        let scoped_avg = |column: &str| -> Result<f64> {
            let sql_all = format!(
                "SELECT AVG({}) FROM ocr_tasks WHERE status = 'completed'",
                column
            );
            let sql_user = format!("{} AND user_id = ?1", sql_all);
            let avg: Option<f64> = match user_id {
                Some(uid) => conn
                    .query_row(&sql_user, params![uid], |row| row.get(0))
                    .map_err(db_err)?,
                None => conn.query_row(&sql_all, [], |row| row.get(0)).map_err(db_err)?,
            };
            Ok(avg.unwrap_or(0.0))
        };
        Ok(OcrStats {
            total_tasks: total,
            completed_tasks: scoped_count("completed")?,
            failed_tasks: scoped_count("failed")?,
            avg_processing_time: scoped_avg("processing_time")?,
            avg_confidence: scoped_avg("confidence_score")?,
        })
    }
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

// ---------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        full_name: row.get("full_name")?,
        role: row.get("role")?,
        is_active: row.get("is_active")?,
        created_at: row.get("created_at")?,
    })
}

fn row_to_document(row: &Row) -> rusqlite::Result<Document> {
    let status: String = row.get("processing_status")?;
    let tags_json: Option<String> = row.get("tags_json")?;
    Ok(Document {
        id: row.get("id")?,
        uuid: row.get("uuid")?,
        filename: row.get("filename")?,
        original_filename: row.get("original_filename")?,
        file_path: row.get("file_path")?,
        file_size: row.get("file_size")?,
        file_type: row.get("file_type")?,
        mime_type: row.get("mime_type")?,
        title: row.get("title")?,
        description: row.get("description")?,
        category: row.get("category")?,
        tags: tags_json.and_then(|t| serde_json::from_str(&t).ok()),
        content_hash: row.get("content_hash")?,
        is_processed: row.get("is_processed")?,
        processing_status: ProcessingStatus::parse(&status),
        extracted_text: row.get("extracted_text")?,
        has_embeddings: row.get("has_embeddings")?,
        embedding_model: row.get("embedding_model")?,
        chunks_count: row.get("chunks_count")?,
        uploaded_by: row.get("uploaded_by")?,
        is_public: row.get("is_public")?,
        access_count: row.get("access_count")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        processed_at: row.get("processed_at")?,
    })
}

fn row_to_chunk(row: &Row) -> rusqlite::Result<DocumentChunk> {
    Ok(DocumentChunk {
        id: row.get("id")?,
        document_id: row.get("document_id")?,
        chunk_index: row.get("chunk_index")?,
        content: row.get("content")?,
        embedding_json: row.get("embedding_json")?,
        embedding_model: row.get("embedding_model")?,
        page_number: row.get("page_number")?,
        start_char: row.get("start_char")?,
        end_char: row.get("end_char")?,
        created_at: row.get("created_at")?,
    })
}

fn row_to_embedded_chunk(row: &Row) -> rusqlite::Result<EmbeddedChunk> {
    Ok(EmbeddedChunk {
        chunk_id: row.get("chunk_id")?,
        document_id: row.get("document_id")?,
        chunk_index: row.get("chunk_index")?,
        content: row.get("content")?,
        embedding_json: row.get("embedding_json")?,
        filename: row.get("filename")?,
        title: row.get("title")?,
        category: row.get("category")?,
    })
}

fn row_to_session(row: &Row) -> rusqlite::Result<ChatSession> {
    Ok(ChatSession {
        id: row.get("id")?,
        uuid: row.get("uuid")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        system_prompt: row.get("system_prompt")?,
        is_active: row.get("is_active")?,
        message_count: row.get("message_count")?,
        total_tokens: row.get("total_tokens")?,
        created_at: row.get("created_at")?,
        last_activity: row.get("last_activity")?,
    })
}

fn row_to_message(row: &Row) -> rusqlite::Result<ChatMessage> {
    let context_json: Option<String> = row.get("context_documents_json")?;
    let scores_json: Option<String> = row.get("similarity_scores_json")?;
    Ok(ChatMessage {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        role: row.get("role")?,
        content: row.get("content")?,
        model_used: row.get("model_used")?,
        tokens_used: row.get("tokens_used")?,
        response_time: row.get("response_time")?,
        context_documents: context_json.and_then(|j| serde_json::from_str(&j).ok()),
        similarity_scores: scores_json.and_then(|j| serde_json::from_str(&j).ok()),
        created_at: row.get("created_at")?,
    })
}

fn row_to_context(row: &Row) -> rusqlite::Result<ChatContext> {
    Ok(ChatContext {
        id: row.get("id")?,
        message_id: row.get("message_id")?,
        document_id: row.get("document_id")?,
        chunk_id: row.get("chunk_id")?,
        similarity_score: row.get("similarity_score")?,
        rank: row.get("rank")?,
    })
}

fn row_to_ocr_task(row: &Row) -> rusqlite::Result<OcrTask> {
    let status: String = row.get("status")?;
    Ok(OcrTask {
        id: row.get("id")?,
        uuid: row.get("uuid")?,
        user_id: row.get("user_id")?,
        input_filename: row.get("input_filename")?,
        input_file_path: row.get("input_file_path")?,
        input_file_type: row.get("input_file_type")?,
        status: ProcessingStatus::parse(&status),
        model_used: row.get("model_used")?,
        processing_time: row.get("processing_time")?,
        extracted_text: row.get("extracted_text")?,
        confidence_score: row.get("confidence_score")?,
        error_message: row.get("error_message")?,
        created_at: row.get("created_at")?,
        completed_at: row.get("completed_at")?,
    })
}
