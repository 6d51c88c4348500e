//! Chat orchestration: one RAG turn per call.
//!
//! A turn moves through received → prompted → answered/failed. The user
//! message commits before retrieval starts; everything the assistant
//! side produces commits in a single transaction at the end. Nothing is
//! retried; any failure aborts the turn and surfaces `None`.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use crate::generation::Generator;
use docbase_core::{GenerationConfig, Result};
use docbase_rag::{SearchMatch, SearchService};
use docbase_store::{ChatSession, NewAssistantMessage, NewChatContext, Store};

/// Context excerpts are capped at this many characters in the prompt.
const EXCERPT_CHARS: usize = 500;

/// What a successful turn hands back to the caller.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub message_id: i64,
    pub response: String,
    pub context: Vec<SearchMatch>,
    pub tokens_used: i64,
    pub response_time: f64,
}

pub struct ChatService {
    store: Arc<Store>,
    search: Arc<SearchService>,
    generator: Arc<dyn Generator>,
    cfg: GenerationConfig,
}

impl ChatService {
    pub fn new(
        store: Arc<Store>,
        search: Arc<SearchService>,
        generator: Arc<dyn Generator>,
        cfg: GenerationConfig,
    ) -> Self {
        Self {
            store,
            search,
            generator,
            cfg,
        }
    }

    /// Start a conversation for a user, optionally overriding the default
    /// system prompt for the whole session.
    pub fn create_session(
        &self,
        user_id: i64,
        title: Option<&str>,
        system_prompt: Option<&str>,
    ) -> Result<ChatSession> {
        let title = match title {
            Some(t) if !t.trim().is_empty() => t.to_string(),
            _ => format!(
                "Conversation {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M")
            ),
        };
        let session = self
            .store
            .create_session(user_id, Some(&title), system_prompt)?;
        info!("Created chat session {} for user {}", session.id, user_id);
        Ok(session)
    }

    /// Run one chat turn. Returns `None` when the session does not belong
    /// to the user or any step of the turn fails; the user's message is
    /// the only thing persisted in that case.
    pub async fn send_message(
        &self,
        session_id: i64,
        user_id: i64,
        message: &str,
        use_rag: bool,
        rag_limit: Option<usize>,
    ) -> Option<TurnOutcome> {
        let started = Instant::now();

        let session = match self.store.get_session(session_id) {
            Ok(Some(s)) if s.user_id == user_id => s,
            Ok(_) => {
                error!("Chat session {} not found for user {}", session_id, user_id);
                return None;
            }
            Err(e) => {
                error!("Could not load chat session {}: {}", session_id, e);
                return None;
            }
        };

        if let Err(e) = self.store.insert_user_message(session_id, message) {
            error!("Could not persist user message: {}", e);
            return None;
        }

        let context = if use_rag {
            let limit = rag_limit.unwrap_or(self.cfg.default_top_k);
            self.search.search(message, limit, None).await
        } else {
            Vec::new()
        };

        let system_prompt = match &session.system_prompt {
            Some(p) if !p.trim().is_empty() => p.as_str(),
            _ => &self.cfg.system_prompt,
        };
        let prompt = build_prompt(system_prompt, message, &context);

        let Some(output) = self.generator.generate(&prompt).await else {
            error!("No answer from the generation endpoint");
            return None;
        };

        let response_time = started.elapsed().as_secs_f64();
        let assistant = NewAssistantMessage {
            content: output.content.clone(),
            model_used: self.generator.model().to_string(),
            tokens_used: output.tokens_used,
            response_time,
            context_documents: context.iter().map(|m| m.document_id).collect(),
            similarity_scores: context.iter().map(|m| m.similarity).collect(),
        };
        let provenance: Vec<NewChatContext> = context
            .iter()
            .enumerate()
            .map(|(rank, m)| NewChatContext {
                document_id: m.document_id,
                chunk_id: Some(m.chunk_id),
                similarity_score: m.similarity,
                rank: rank as i64,
            })
            .collect();

        let message_id = match self
            .store
            .record_assistant_turn(session_id, &assistant, &provenance)
        {
            Ok(id) => id,
            Err(e) => {
                error!("Could not persist assistant turn: {}", e);
                return None;
            }
        };

        Some(TurnOutcome {
            message_id,
            response: output.content,
            context,
            tokens_used: output.tokens_used,
            response_time,
        })
    }
}

/// Assemble the full prompt: system prompt, the question, and, when
/// retrieval found anything, a numbered context section in rank order.
fn build_prompt(system_prompt: &str, message: &str, context: &[SearchMatch]) -> String {
    let mut prompt = format!("{}\n\nQuestion: {}", system_prompt, message);

    if !context.is_empty() {
        prompt.push_str("\n\nContext from documents:\n");
        for (i, hit) in context.iter().enumerate() {
            prompt.push_str(&format!(
                "\n{}. From document '{}':\n{}...\n",
                i + 1,
                hit.title,
                excerpt(&hit.content, EXCERPT_CHARS)
            ));
        }
    }

    prompt
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
