//! Shared application state.

use std::sync::Arc;

use docbase_chat::{ChatService, Generator};
use docbase_core::AppConfig;
use docbase_ocr::{OcrClient, OcrService};
use docbase_rag::{Embedder, SearchService};
use docbase_store::Store;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<Store>,
    pub embedder: Arc<dyn Embedder>,
    pub search: Arc<SearchService>,
    pub chat: ChatService,
    pub ocr: OcrService,
}

impl AppState {
    /// Wire the services together. The client seams are trait objects so
    /// tests can run the whole HTTP surface against stubs.
    pub fn new(
        config: AppConfig,
        store: Arc<Store>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        ocr_client: Arc<dyn OcrClient>,
    ) -> Self {
        let search = Arc::new(SearchService::new(store.clone(), embedder.clone()));
        let chat = ChatService::new(
            store.clone(),
            search.clone(),
            generator,
            config.generation.clone(),
        );
        let ocr = OcrService::new(store.clone(), ocr_client);

        Self {
            config,
            store,
            embedder,
            search,
            chat,
            ocr,
        }
    }
}
