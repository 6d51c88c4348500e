//! End-to-end API tests.
//!
//! The server runs against stub model clients, so the whole upload →
//! embed → search → chat path is exercised over real HTTP without any
//! remote endpoint.

use std::sync::Arc;

use async_trait::async_trait;

use docbase_chat::{GenerationOutput, Generator};
use docbase_ocr::OcrClient;
use docbase_rag::Embedder;
use docbase_server::{routes, AppState};

/// Embeds text by keyword presence, so related texts land close together.
struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let t = text.to_lowercase();
        Some(vec![
            if t.contains("alpha") { 1.0 } else { 0.0 },
            if t.contains("beta") { 1.0 } else { 0.0 },
            0.1,
        ])
    }

    fn model(&self) -> &str {
        "stub-embed"
    }
}

struct StubGenerator;

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(&self, _prompt: &str) -> Option<GenerationOutput> {
        Some(GenerationOutput {
            content: "stub answer".into(),
            tokens_used: 12,
        })
    }

    fn model(&self) -> &str {
        "stub-gen"
    }
}

struct StubOcr;

#[async_trait]
impl OcrClient for StubOcr {
    async fn recognize(&self, _image: &[u8]) -> Option<String> {
        Some("RECOGNIZED TEXT".into())
    }

    fn model(&self) -> &str {
        "stub-vision"
    }
}

async fn spawn_app() -> (String, reqwest::Client, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = docbase_core::AppConfig::from_env(dir.path()).unwrap();
    let store = Arc::new(docbase_store::Store::open(&config.data_paths.db).unwrap());
    let state = Arc::new(AppState::new(
        config,
        store,
        Arc::new(KeywordEmbedder),
        Arc::new(StubGenerator),
        Arc::new(StubOcr),
    ));
    let app = routes::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), reqwest::Client::new(), dir)
}

async fn register_user(base: &str, client: &reqwest::Client, username: &str) -> i64 {
    let response = client
        .post(format!("{}/api/users", base))
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "full_name": username,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    body["user"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn requests_without_identity_are_rejected() {
    let (base, client, _dir) = spawn_app().await;

    let response = client
        .get(format!("{}/api/documents", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn unsupported_upload_is_a_validation_error() {
    let (base, client, _dir) = spawn_app().await;
    let user_id = register_user(&base, &client, "uploader").await;

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(b"binary".to_vec()).file_name("tool.exe"),
    );
    let response = client
        .post(format!("{}/api/documents", base))
        .header("x-user-id", user_id.to_string())
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn full_document_chat_flow() {
    let (base, client, _dir) = spawn_app().await;
    let user_id = register_user(&base, &client, "alice").await;

    // Upload two small text documents.
    let mut doc_ids = Vec::new();
    for (name, content) in [
        ("alpha.txt", "Notes about alpha. The alpha project ships in March."),
        ("beta.txt", "Notes about beta. The beta rollout is paused."),
    ] {
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(content.as_bytes().to_vec())
                    .file_name(name.to_string()),
            )
            .text("category", "notes");
        let response = client
            .post(format!("{}/api/documents", base))
            .header("x-user-id", user_id.to_string())
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["document"]["processing_status"], "completed");
        doc_ids.push(body["document"]["id"].as_i64().unwrap());
    }

    // Run the embedding pass for both.
    for doc_id in &doc_ids {
        let response = client
            .post(format!("{}/api/documents/{}/embeddings", base, doc_id))
            .header("x-user-id", user_id.to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "completed");
        assert!(body["chunks_embedded"].as_i64().unwrap() >= 1);
    }

    // Search ranks the alpha document first for an alpha query.
    let response = client
        .post(format!("{}/api/search", base))
        .header("x-user-id", user_id.to_string())
        .json(&serde_json::json!({ "query": "tell me about alpha", "top_k": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0]["document_id"].as_i64().unwrap(), doc_ids[0]);

    // A filtered search never leaves the subset.
    let response = client
        .post(format!("{}/api/search", base))
        .header("x-user-id", user_id.to_string())
        .json(&serde_json::json!({
            "query": "tell me about alpha",
            "document_ids": [doc_ids[1]],
        }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    for result in body["results"].as_array().unwrap() {
        assert_eq!(result["document_id"].as_i64().unwrap(), doc_ids[1]);
    }

    // Chat: create a session and run a RAG turn.
    let response = client
        .post(format!("{}/api/chat/sessions", base))
        .header("x-user-id", user_id.to_string())
        .json(&serde_json::json!({ "title": "test chat" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    let session_id = body["session"]["id"].as_i64().unwrap();

    let response = client
        .post(format!("{}/api/chat/sessions/{}/messages", base, session_id))
        .header("x-user-id", user_id.to_string())
        .json(&serde_json::json!({ "message": "what is alpha?", "rag_limit": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["response"], "stub answer");
    assert_eq!(body["tokens_used"], 12);
    assert!(!body["context"].as_array().unwrap().is_empty());

    // History holds both sides of the turn, in order.
    let response = client
        .get(format!("{}/api/chat/sessions/{}/messages", base, session_id))
        .header("x-user-id", user_id.to_string())
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");

    // Another user cannot see the session.
    let other_id = register_user(&base, &client, "mallory").await;
    let response = client
        .get(format!("{}/api/chat/sessions/{}/messages", base, session_id))
        .header("x-user-id", other_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // Aggregates reflect the activity.
    let response = client
        .get(format!("{}/api/stats", base))
        .header("x-user-id", user_id.to_string())
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["documents"]["total_documents"], 2);
    assert_eq!(body["chat"]["total_messages"], 2);
    assert_eq!(body["embedding_model"], "stub-embed");
}

#[tokio::test]
async fn embedding_pass_for_missing_document_is_404() {
    let (base, client, _dir) = spawn_app().await;
    let user_id = register_user(&base, &client, "nobody").await;

    let response = client
        .post(format!("{}/api/documents/4242/embeddings", base))
        .header("x-user-id", user_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn ocr_submission_runs_to_completion() {
    let (base, client, _dir) = spawn_app().await;
    let user_id = register_user(&base, &client, "scanner").await;

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(vec![0x89, 0x50, 0x4e, 0x47]).file_name("receipt.png"),
    );
    let response = client
        .post(format!("{}/api/ocr", base))
        .header("x-user-id", user_id.to_string())
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["task"]["status"], "completed");
    assert_eq!(body["task"]["extracted_text"], "RECOGNIZED TEXT");
    let task_id = body["task"]["id"].as_i64().unwrap();

    // The task is visible to its owner and hidden from others.
    let response = client
        .get(format!("{}/api/ocr/{}", base, task_id))
        .header("x-user-id", user_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let other_id = register_user(&base, &client, "other").await;
    let response = client
        .get(format!("{}/api/ocr/{}", base, task_id))
        .header("x-user-id", other_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
